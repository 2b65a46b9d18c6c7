//! Caller-supplied callbacks for connection lifecycle and inbound events.
//!
//! All callbacks run on the connection task, so they should hand work off
//! (for example through a channel) rather than block. Unset callbacks are
//! simply skipped.

use std::fmt;
use std::sync::Arc;

use crate::protocol::InboundEvent;
use crate::types::CloseEvent;

type OpenFn = dyn Fn() + Send + Sync;
type MessageFn = dyn Fn(InboundEvent) + Send + Sync;
type ErrorFn = dyn Fn(String) + Send + Sync;
type CloseFn = dyn Fn(CloseEvent) + Send + Sync;

/// Bundle of optional event callbacks, registered before the socket is
/// created and shared with the connection task.
#[derive(Clone, Default)]
pub struct EventHandlers {
    on_open: Option<Arc<OpenFn>>,
    on_message: Option<Arc<MessageFn>>,
    on_error: Option<Arc<ErrorFn>>,
    on_close: Option<Arc<CloseFn>>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once per successful open, including reopens after a reconnect.
    pub fn on_open(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Arc::new(callback));
        self
    }

    /// Called for every decoded inbound event, in arrival order.
    pub fn on_message(
        mut self,
        callback: impl Fn(InboundEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_message = Some(Arc::new(callback));
        self
    }

    /// Called with a description when the transport hits a socket error.
    /// Errors do not imply closure; a close event follows separately when
    /// the connection actually drops.
    pub fn on_error(mut self, callback: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Called once per close with the code and reason, whether the close
    /// was manual, server-initiated, or synthesized from a socket failure.
    pub fn on_close(
        mut self,
        callback: impl Fn(CloseEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_close = Some(Arc::new(callback));
        self
    }

    pub(crate) fn emit_open(&self) {
        if let Some(callback) = &self.on_open {
            callback();
        }
    }

    pub(crate) fn emit_message(&self, event: InboundEvent) {
        if let Some(callback) = &self.on_message {
            callback(event);
        }
    }

    pub(crate) fn emit_error(&self, description: String) {
        if let Some(callback) = &self.on_error {
            callback(description);
        }
    }

    pub(crate) fn emit_close(&self, event: CloseEvent) {
        if let Some(callback) = &self.on_close {
            callback(event);
        }
    }
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_open", &self.on_open.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_close", &self.on_close.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn unset_callbacks_are_skipped() {
        let handlers = EventHandlers::new();
        handlers.emit_open();
        handlers.emit_message(InboundEvent::Pong);
        handlers.emit_error("boom".into());
        handlers.emit_close(CloseEvent::new(1000, "done"));
    }

    #[test]
    fn registered_callbacks_receive_their_payloads() {
        let opens = Arc::new(AtomicUsize::new(0));
        let opens_seen = opens.clone();
        let handlers = EventHandlers::new()
            .on_open(move || {
                opens_seen.fetch_add(1, Ordering::SeqCst);
            })
            .on_close(|event| {
                assert_eq!(event.code, 1006);
                assert_eq!(event.reason, "abnormal closure");
            });

        handlers.emit_open();
        handlers.emit_open();
        handlers.emit_close(CloseEvent::new(1006, "abnormal closure"));
        assert_eq!(opens.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn clones_share_the_same_callbacks() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let handlers = EventHandlers::new().on_message(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let cloned = handlers.clone();
        handlers.emit_message(InboundEvent::Pong);
        cloned.emit_message(InboundEvent::Pong);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
