// src/dev_utils.rs
#![allow(dead_code)] // Shared by test modules; not every module uses every helper.

use crate::core::options::OptionValue;
use crate::system::prompt::{PromptRequest, Prompter};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A prompter that answers from a fixed script and counts how often it was asked.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: HashMap<String, OptionValue>,
    calls: AtomicUsize,
    requests: Mutex<Vec<PromptRequest>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers prompts for the option displayed as `name` with `value`.
    pub fn answer(mut self, name: &str, value: impl Into<OptionValue>) -> Self {
        self.answers.insert(name.to_string(), value.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<PromptRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn prompt(&self, request: PromptRequest) -> anyhow::Result<Option<OptionValue>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.answers.get(&request.name).cloned();
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        Ok(answer)
    }
}
