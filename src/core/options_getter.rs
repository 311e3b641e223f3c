// src/core/options_getter.rs

//! # Option Getter
//!
//! Lazy, cache-on-first-read access to the option values of one execution.
//!
//! ## Resolution order for a key (first hit wins)
//! 1. The parsed value under any spelling of the key.
//! 2. An interactive prompt, only when the caller passed a [`PromptSpec`].
//! 3. The declared `default`.
//! 4. Nothing: a `required` option fails, any other option resolves to `None`.
//!
//! The resolved value is normalized, validated against its declaration and written
//! back under every spelling, so later reads (by alias or camel case) agree and
//! never prompt again.

use crate::core::commons::to_camel_case;
use crate::core::options::{OptionSchema, OptionValue, OptionValues};
use crate::core::validation::{find_value, normalize_value, validate_value};
use crate::errors::{EngineError, OptionsError};
use crate::system::prompt::{PromptRequest, PromptSpec, Prompter};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct GetterInner {
    schema: OptionSchema,
    prompter: Arc<dyn Prompter>,
    values: Mutex<OptionValues>,
    // Canonical keys whose resolution already ran.
    resolved: Mutex<HashSet<String>>,
    // Serializes resolutions so one key is never prompted for twice.
    resolving: tokio::sync::Mutex<()>,
}

/// Shared handle to the option values of one execution.
#[derive(Clone)]
pub struct OptionsGetter {
    inner: Arc<GetterInner>,
}

impl OptionsGetter {
    /// A getter over `values`, resolving missing ones through `prompter`.
    pub fn new(schema: OptionSchema, values: OptionValues, prompter: Arc<dyn Prompter>) -> Self {
        Self {
            inner: Arc::new(GetterInner {
                schema,
                prompter,
                values: Mutex::new(values),
                resolved: Mutex::new(HashSet::new()),
                resolving: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// The schema values are resolved against.
    pub fn schema(&self) -> &OptionSchema {
        &self.inner.schema
    }

    /// Resolves one option by any of its spellings.
    ///
    /// # Errors
    /// - `Unknown` if no entry declares `name`.
    /// - `Required` if a required option ends up without value.
    /// - Type, choices or `nargs` violations of the resolved value.
    pub async fn get_value(
        &self,
        name: &str,
        prompt: Option<PromptSpec>,
    ) -> Result<Option<OptionValue>, EngineError> {
        let schema = &self.inner.schema;
        let Some((key, config)) = schema.lookup(name) else {
            return Err(OptionsError::Unknown {
                name: name.to_string(),
            }
            .into());
        };

        let _resolving = self.inner.resolving.lock().await;
        if lock(&self.inner.resolved).contains(key) {
            return Ok(find_value(schema, key, &lock(&self.inner.values)).cloned());
        }

        let display = schema.display_name(key);
        let mut value = find_value(schema, key, &lock(&self.inner.values)).cloned();

        if value.is_none()
            && let Some(spec) = prompt
        {
            let request = PromptRequest::for_option(&display, config, &spec);
            value = self
                .inner
                .prompter
                .prompt(request)
                .await
                .map_err(EngineError::from_handler)?;
        }

        let value = value.or_else(|| config.default.clone());
        let Some(value) = value else {
            if config.required {
                return Err(OptionsError::Required { name: display }.into());
            }
            lock(&self.inner.resolved).insert(key.to_string());
            return Ok(None);
        };

        let value = normalize_value(config, value);
        validate_value(schema, key, config, &value)?;

        {
            let mut values = lock(&self.inner.values);
            for variant in schema.variants(key) {
                values.insert(variant, value.clone());
            }
        }
        lock(&self.inner.resolved).insert(key.to_string());
        log::trace!("Resolved option '{}' = {}", key, value);
        Ok(Some(value))
    }

    /// Resolves several options at once, without prompting.
    ///
    /// The result is keyed by each requested name and by its camel-cased form.
    /// Options that resolve to nothing are left out.
    pub async fn get(&self, names: &[&str]) -> Result<OptionValues, EngineError> {
        let mut result = OptionValues::new();
        for name in names {
            if let Some(value) = self.get_value(name, None).await? {
                let camel = to_camel_case(name);
                if camel != *name {
                    result.insert(camel, value.clone());
                }
                result.insert((*name).to_string(), value);
            }
        }
        Ok(result)
    }

    /// A string option, without prompting.
    pub async fn get_string(&self, name: &str) -> Result<Option<String>, EngineError> {
        Ok(self
            .get_value(name, None)
            .await?
            .and_then(|v| v.as_str().map(String::from)))
    }

    /// A boolean option, without prompting. Absent flags read as `false`.
    pub async fn get_bool(&self, name: &str) -> Result<bool, EngineError> {
        Ok(self
            .get_value(name, None)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    /// A number option, without prompting.
    pub async fn get_number(&self, name: &str) -> Result<Option<f64>, EngineError> {
        Ok(self.get_value(name, None).await?.and_then(|v| v.as_f64()))
    }

    /// Everything known so far, without resolving, prompting or validating.
    pub fn values(&self) -> OptionValues {
        lock(&self.inner.values).clone()
    }
}

impl fmt::Debug for OptionsGetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionsGetter")
            .field("schema", &self.inner.schema)
            .field("values", &*lock(&self.inner.values))
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// MARK: --- UNIT TESTS ---
