//! # Error types used by the bus and its handlers.
//!
//! This module defines two error enums:
//!
//! - [`BusError`] errors raised while dispatching events or by handlers.
//! - [`ConfigError`] errors raised for invalid bus configuration.
//!
//! [`BusError`] is `Clone`: a dispatch future caches the first error for
//! late readers, and every error subscriber receives its own copy.

use std::sync::Arc;

use thiserror::Error;

use crate::event::EventId;
use crate::params::ParamErrors;

/// # Errors produced by event dispatch and handlers.
///
/// The first error of a dispatch resolves its future; every error is also
/// delivered to [`EventId::ASYNC_ERROR`] subscribers.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum BusError {
    /// Dispatched event has no registered handler.
    #[error("no handler found for event {event}")]
    NoHandler {
        /// The event that nothing was bound to.
        event: EventId,
    },

    /// [`EventId::NONE`] was used as a dispatch target.
    #[error("event ID 0 cannot be dispatched")]
    InvalidEvent,

    /// Dispatch could not be completed because the bus is shutting down.
    #[error("dispatch cannot be completed, event bus is shutting down")]
    ShuttingDown,

    /// A registration operation referenced a handler id that isn't registered.
    #[error("no registered handler with id '{id}'")]
    UnknownHandler {
        /// The missing handler id.
        id: String,
    },

    /// A handler returned an error while processing a dispatch.
    #[error("handler '{id}' failed to handle event {event}: {source}")]
    HandlerFailed {
        /// Id of the failing handler.
        id: String,
        /// Event being handled at the time.
        event: EventId,
        /// The error the handler returned.
        source: Arc<BusError>,
    },

    /// A parameter list didn't satisfy a handler's [`ParamSpec`](crate::ParamSpec).
    #[error(transparent)]
    InvalidParams(#[from] ParamErrors),

    /// Free-form failure reported by a handler or via
    /// [`EventBus::dispatch_failure`](crate::EventBus::dispatch_failure).
    #[error("{0}")]
    Failure(String),
}

impl BusError {
    /// Builds a [`BusError::Failure`] from a message.
    pub fn failure(msg: impl Into<String>) -> Self {
        BusError::Failure(msg.into())
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::NoHandler { .. } => "no_handler",
            BusError::InvalidEvent => "invalid_event",
            BusError::ShuttingDown => "shutting_down",
            BusError::UnknownHandler { .. } => "unknown_handler",
            BusError::HandlerFailed { .. } => "handler_failed",
            BusError::InvalidParams(_) => "invalid_params",
            BusError::Failure(_) => "failure",
        }
    }
}

/// # Errors produced while configuring a bus.
///
/// Construction fails fast: [`BusBuilder::build`](crate::BusBuilder::build)
/// rejects invalid settings before any resource is allocated.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Dispatch buffer size must hold at least one event.
    #[error("buffer size '{0}' is invalid, must be >= 1")]
    InvalidBufferSize(usize),

    /// At least one worker is needed to drain the queue.
    #[error("worker count '{0}' is invalid, must be >= 1")]
    InvalidWorkerCount(usize),
}
