//! # eventbus
//!
//! **eventbus** is an in-process event bus with pluggable handlers.
//!
//! It provides a loosely-coupled publish/subscribe pipeline: typed events
//! carry heterogeneous parameter lists, each dispatch reaches the handlers
//! registered for its event, and handler errors flow back to the publisher
//! and/or to dedicated error subscribers. It is designed to be embedded in
//! a host process, not to be a network broker.
//!
//! ## Features
//!
//! | Area             | Description                                                      | Key types / traits                     |
//! |------------------|------------------------------------------------------------------|----------------------------------------|
//! | **Dispatch**     | Fire-and-forget or result-carrying event publication.            | [`EventBus`], [`DispatchFuture`]       |
//! | **Handlers**     | Subscribe per event id; closures or full implementations.        | [`Handler`], [`HandlerFn`]             |
//! | **Parameters**   | Declarative validation/extraction of positional parameters.      | [`ParamSpec`], [`Param`], [`params!`]  |
//! | **Futures**      | Resolve-once result carriers with cached re-reads.               | [`Future`]                             |
//! | **Queues**       | Priority-insert queue consumed as a channel stream.              | [`OrderedQueue`], [`ChannelQueue`]     |
//! | **Errors**       | Typed bus errors, delivered to error subscribers.                | [`BusError`], [`ConfigError`]          |
//! | **Configuration**| Validated builder plus a process-wide singleton.                 | [`BusBuilder`], [`instance`]           |
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use eventbus::{map_param, params, EventBus, EventId};
//!
//! const FILE_SAVED: EventId = EventId(2);
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let bus = EventBus::new();
//!
//!     // Subscribe a closure that extracts one string parameter.
//!     bus.register_fn("audit", FILE_SAVED, |_event, params| {
//!         let mut path: Option<String> = None;
//!         map_param(&mut path, params)?;
//!         println!("saved: {}", path.unwrap_or_default());
//!         Ok(())
//!     })
//!     .await;
//!
//!     bus.start(CancellationToken::new());
//!     bus.dispatch(FILE_SAVED, params!["report.txt".to_string()]).await;
//!
//!     // Drain the queue and stop every handler.
//!     bus.shutdown().await;
//! }
//! ```
//!
//! ---

mod bus;
mod config;
mod dispatch;
mod error;
mod event;
mod future;
mod handler;
mod params;
mod queue;
mod registry;

// ---- Public re-exports ----

pub use bus::{init_instance, instance, EventBus};
pub use config::{BusBuilder, BusConfig, DEBUG_ENV_VAR};
pub use dispatch::DispatchFuture;
pub use error::{BusError, ConfigError};
pub use event::EventId;
pub use future::Future;
pub use handler::{Handler, HandlerFn, HandlerRef};
pub use params::{
    all_of, any_pass, assert_and_store, is_type, map_param, not_absent, optional, param, pass,
    Assertion, Param, ParamError, ParamErrors, ParamSpec, Params,
};
pub use queue::{ChannelQueue, ChannelQueueConfig, OrderedQueue};

// Test-suite escape hatch; not part of the supported API.
#[doc(hidden)]
pub use bus::reset_instance_for_tests;
