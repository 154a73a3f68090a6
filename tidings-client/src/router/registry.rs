//! Per-category handler registry.

use parking_lot::RwLock;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tidings_core::types::{Message, MessageCategory};
use tidings_telemetry::metrics::TidingsMetrics;
use tracing::{error, warn};

/// Error returned by a message handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    /// Creates a handler error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl From<&str> for HandlerError {
    fn from(reason: &str) -> Self {
        Self::new(reason)
    }
}

impl From<String> for HandlerError {
    fn from(reason: String) -> Self {
        Self(reason)
    }
}

/// Result of one handler invocation.
pub type HandlerResult = Result<(), HandlerError>;

/// Consumer of routed messages.
///
/// Handlers run synchronously on the delivery path; long work should be
/// handed off to a task.
pub trait MessageHandler: Send + Sync {
    /// Handles one message.
    fn handle(&self, message: &Message) -> HandlerResult;
}

impl<F> MessageHandler for F
where
    F: Fn(&Message) -> HandlerResult + Send + Sync,
{
    fn handle(&self, message: &Message) -> HandlerResult {
        self(message)
    }
}

/// Identifies a registered handler for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

/// Outcome of dispatching one message to a registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers that returned `Ok`.
    pub handled: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
}

type Entry = (HandlerId, Arc<dyn MessageHandler>);

/// Handlers for one message category, run in registration order.
pub struct HandlerRegistry {
    category: MessageCategory,
    next_id: AtomicU64,
    handlers: RwLock<Vec<Entry>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(category: MessageCategory) -> Self {
        Self {
            category,
            next_id: AtomicU64::new(1),
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Category served by this registry.
    #[must_use]
    pub fn category(&self) -> MessageCategory {
        self.category
    }

    /// Registers a handler.
    pub fn add(&self, handler: impl MessageHandler + 'static) -> HandlerId {
        self.add_shared(Arc::new(handler))
    }

    /// Registers a shared handler.
    pub fn add_shared(&self, handler: Arc<dyn MessageHandler>) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().push((id, handler));
        id
    }

    /// Unregisters a handler; returns false if `id` is unknown.
    pub fn remove(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Returns true if no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Runs every handler on `message`.
    ///
    /// Errors and panics are logged per handler and never stop the others.
    /// The handler list is snapshotted first, so handlers may add or remove
    /// handlers without deadlocking.
    pub fn dispatch(&self, message: &Message) -> DispatchReport {
        let handlers: Vec<Entry> = self.handlers.read().clone();
        let mut report = DispatchReport::default();

        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler.handle(message))) {
                Ok(Ok(())) => report.handled += 1,
                Ok(Err(e)) => {
                    warn!(
                        category = %self.category,
                        handler = id.0,
                        channel = %message.channel,
                        error = %e,
                        "Message handler failed"
                    );
                    TidingsMetrics::handler_failed(self.category.as_str());
                    report.failed += 1;
                }
                Err(payload) => {
                    error!(
                        category = %self.category,
                        handler = id.0,
                        channel = %message.channel,
                        panic = %panic_message(payload.as_ref()),
                        "Message handler panicked"
                    );
                    TidingsMetrics::handler_failed(self.category.as_str());
                    report.failed += 1;
                }
            }
        }

        report
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("category", &self.category)
            .field("handlers", &self.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
