//! # Handler contract: the extension point for bus subscribers.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BusError;
use crate::event::EventId;
use crate::params::Param;

/// Shared handle to a registered handler.
pub type HandlerRef = Arc<dyn Handler>;

/// A component that processes events received from the bus.
///
/// Errors returned from [`Handler::handle_event`] are reported to
/// [`EventId::ASYNC_ERROR`] subscribers and, for result-carrying
/// dispatches, resolve the caller's future (first error wins).
///
/// Handlers run under the bus's shared registration lock: never call a
/// registration method of the same bus from inside a handler, or the
/// dispatch worker deadlocks. Publishing further events is fine.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Processes one event with its parameter list.
    async fn handle_event(&self, event: EventId, params: &[Option<Param>]) -> Result<(), BusError>;

    /// Invoked once when the bus shuts down (or the handler is
    /// unregistered) so resources can be released. No-op by default.
    async fn stop(&self) {}
}

/// Function-backed handler for simple subscription cases where
/// [`Handler::stop`] has no real semantics.
pub struct HandlerFn<F> {
    f: F,
}

impl<F> HandlerFn<F>
where
    F: Fn(EventId, &[Option<Param>]) -> Result<(), BusError> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        HandlerFn { f }
    }

    /// Creates the handler and returns it as a shared [`HandlerRef`].
    pub fn arc(f: F) -> HandlerRef {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F> Handler for HandlerFn<F>
where
    F: Fn(EventId, &[Option<Param>]) -> Result<(), BusError> + Send + Sync + 'static,
{
    async fn handle_event(&self, event: EventId, params: &[Option<Param>]) -> Result<(), BusError> {
        (self.f)(event, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::param;

    #[tokio::test]
    async fn handler_fn_forwards_to_the_closure() {
        let handler = HandlerFn::arc(|event, params| {
            assert_eq!(event, EventId(4));
            assert_eq!(params.len(), 1);
            Ok(())
        });
        handler
            .handle_event(EventId(4), &[param("x")])
            .await
            .expect("closure succeeds");
        // Default stop is a no-op.
        handler.stop().await;
    }
}
