// src/core/hooks.rs

//! # Hook Registry
//!
//! Ordered, awaited interception points. Every phase of the engine is a payload
//! type implementing [`HookEvent`]; handlers take the payload by value and hand it
//! back, possibly mutated through its setters, to the next handler.
//!
//! ## Guarantees
//! - `call` runs handlers strictly in registration order, one at a time.
//! - The handler list is copied before iterating, so handlers may register or
//!   remove hooks (including themselves) while a call is in flight.
//! - The first handler error aborts the call and surfaces as an engine error.

use crate::errors::EngineError;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A named lifecycle phase and the payload its handlers receive.
pub trait HookEvent: Send + 'static {
    /// The phase name as plugins know it (`beforeResolve`, `error`, ...).
    const NAME: &'static str;
}

/// Identifies a registration so it can be removed with [`HookRegistry::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

type HookFn<E> = Arc<dyn Fn(E) -> BoxFuture<'static, anyhow::Result<E>> + Send + Sync>;

struct Entry {
    id: HookId,
    once: bool,
    // Always a `HookFn<E>` for the event registered under this name.
    handler: Arc<dyn Any + Send + Sync>,
}

/// Registry of hook handlers keyed by phase name.
#[derive(Default)]
pub struct HookRegistry {
    next_id: AtomicU64,
    hooks: Mutex<HashMap<&'static str, Vec<Entry>>>,
}

impl HookRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler that runs on every call of `E`.
    pub fn on<E, F, Fut>(&self, handler: F) -> HookId
    where
        E: HookEvent,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<E>> + Send + 'static,
    {
        self.register::<E>(Arc::new(move |event: E| handler(event).boxed()), false)
    }

    /// Registers a handler that is removed as soon as a call of `E` picks it up.
    pub fn once<E, F, Fut>(&self, handler: F) -> HookId
    where
        E: HookEvent,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<E>> + Send + 'static,
    {
        self.register::<E>(Arc::new(move |event: E| handler(event).boxed()), true)
    }

    /// Removes a registration. Returns whether it was still registered.
    pub fn off<E: HookEvent>(&self, id: HookId) -> bool {
        let mut hooks = self.lock();
        let Some(entries) = hooks.get_mut(E::NAME) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        before != entries.len()
    }

    /// Number of handlers currently registered for `E`.
    pub fn count<E: HookEvent>(&self) -> usize {
        self.lock().get(E::NAME).map_or(0, Vec::len)
    }

    /// Passes `event` through every handler registered for `E`, in order.
    pub async fn call<E: HookEvent>(&self, event: E) -> Result<E, EngineError> {
        let handlers: Vec<HookFn<E>> = {
            let mut hooks = self.lock();
            let Some(entries) = hooks.get_mut(E::NAME) else {
                return Ok(event);
            };
            let handlers = entries
                .iter()
                .filter_map(|entry| entry.handler.downcast_ref::<HookFn<E>>().cloned())
                .collect();
            entries.retain(|entry| !entry.once);
            handlers
        };

        log::trace!("Calling {} handler(s) for '{}'.", handlers.len(), E::NAME);
        let mut event = event;
        for handler in handlers {
            event = handler(event).await.map_err(EngineError::from_handler)?;
        }
        Ok(event)
    }

    fn register<E: HookEvent>(&self, handler: HookFn<E>, once: bool) -> HookId {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handler: Arc<dyn Any + Send + Sync> = Arc::new(handler);
        self.lock()
            .entry(E::NAME)
            .or_default()
            .push(Entry { id, once, handler });
        log::trace!("Registered hook {:?} on '{}' (once: {}).", id, E::NAME, once);
        id
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<&'static str, Vec<Entry>>> {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hooks = self.lock();
        let mut map = f.debug_map();
        for (name, entries) in hooks.iter() {
            map.entry(name, &entries.len());
        }
        map.finish()
    }
}

// MARK: --- UNIT TESTS ---
