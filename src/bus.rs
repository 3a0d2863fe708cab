//! # EventBus façade: lifecycle, registration, and dispatch.
//!
//! [`EventBus`] is a cheap-clone handle over shared state; every clone
//! addresses the same bus. The lifecycle is start-once / stop-once:
//!
//! ```text
//! CREATED ──start()──► RUNNING ──stop()──► STOPPING ──drained──► STOPPED
//!    │                                        │
//!    └── registration + dispatch allowed ─────┘  (new pushes rejected)
//! ```
//!
//! Dispatches accepted before `stop` are always processed; `wait` returns
//! once the queue has fully drained and every worker has exited.
//!
//! A process-wide singleton is available through [`instance`] /
//! [`init_instance`] for applications that want one global bus.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::config::{BusBuilder, BusConfig};
use crate::dispatch::{worker, Dispatch, DispatchFuture};
use crate::error::{BusError, ConfigError};
use crate::event::EventId;
use crate::future::Future;
use crate::handler::{HandlerFn, HandlerRef};
use crate::params::{map_param, param, Param, Params};
use crate::queue::{ChannelQueue, ChannelQueueConfig};
use crate::registry::Registry;

/// In-process event bus with pluggable handlers.
///
/// Publishers submit events with [`EventBus::dispatch`] (fire-and-forget)
/// or [`EventBus::dispatch_result`] (returns a resolve-once future carrying
/// the first handler error). Handlers subscribe per event id and receive
/// every dispatch for their events on one of the bus's workers.
#[derive(Clone)]
pub struct EventBus {
    core: Arc<BusCore>,
}

pub(crate) struct BusCore {
    conf: BusConfig,
    registry: Registry,
    /// Lifetime token: the dispatch queue is its child, so cancelling it
    /// starts the drain even for a queue created afterwards.
    cancel: CancellationToken,
    events: OnceLock<ChannelQueue<Dispatch>>,
    workers: TaskTracker,
    start_once: Once,
    handlers_stopped: AtomicBool,
}

impl BusCore {
    /// The dispatch queue, created on first use so events can be queued
    /// before [`EventBus::start`].
    pub(crate) fn events(&self) -> &ChannelQueue<Dispatch> {
        self.events.get_or_init(|| {
            ChannelQueue::new(
                &self.cancel,
                ChannelQueueConfig {
                    channel_size: self.conf.num_workers,
                    initial_buffer: self.conf.buffer_size,
                },
            )
        })
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn debug_enabled(&self) -> bool {
        self.conf.debug_logging
    }

    pub(crate) fn stop(&self) {
        self.cancel.cancel();
    }

    /// True for exactly one caller; gates handler shutdown.
    pub(crate) fn begin_handler_stop(&self) -> bool {
        !self.handlers_stopped.swap(true, Ordering::SeqCst)
    }
}

impl EventBus {
    /// Creates a bus with default settings.
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Starts configuring a bus.
    pub fn builder() -> BusBuilder {
        BusBuilder::default()
    }

    pub(crate) fn with_config(conf: BusConfig) -> Self {
        EventBus {
            core: Arc::new(BusCore {
                conf,
                registry: Registry::new(),
                cancel: CancellationToken::new(),
                events: OnceLock::new(),
                workers: TaskTracker::new(),
                start_once: Once::new(),
                handlers_stopped: AtomicBool::new(false),
            }),
        }
    }

    /// Starts event processing if it hasn't started already.
    ///
    /// Safe to call repeatedly from multiple tasks; only the first call
    /// spawns the workers. When `cancel` fires the bus shuts down
    /// gracefully: accepted dispatches are drained, then handlers are
    /// stopped. A stopped bus cannot be restarted.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(&self, cancel: CancellationToken) {
        self.core.start_once.call_once(|| {
            if self.core.debug_enabled() {
                debug!(workers = self.core.conf.num_workers, "event bus starting");
            }
            // Materialize the queue before the first worker asks for it.
            let _ = self.core.events();
            for worker_num in 0..self.core.conf.num_workers {
                self.core
                    .workers
                    .spawn(worker(Arc::clone(&self.core), worker_num, cancel.clone()));
            }
            self.core.workers.close();
        });
    }

    /// Submits an event for propagation, fire-and-forget.
    ///
    /// Handler errors are propagated to [`EventId::ASYNC_ERROR`]
    /// subscribers. Dispatching [`EventId::NONE`] publishes an
    /// invalid-event error instead. If the bus is stopping the event is
    /// silently not accepted.
    ///
    /// This can safely be called from within a handler.
    pub async fn dispatch(&self, event: EventId, params: Params) {
        if event == EventId::NONE {
            if self.core.debug_enabled() {
                debug!("no event specified for dispatch");
            }
            self.dispatch_error(BusError::InvalidEvent).await;
            return;
        }
        let accepted = self
            .core
            .events()
            .push(Dispatch {
                event,
                params,
                future: Future::symbolic(),
            })
            .await;
        if self.core.debug_enabled() {
            debug!(event = %event, accepted, "event published to queue");
        }
    }

    /// Submits an event and returns a future resolving with the first
    /// error a handler reported, or `Ok(())`.
    ///
    /// All errors still reach [`EventId::ASYNC_ERROR`] subscribers. If the
    /// bus is shutting down the future comes back pre-resolved with
    /// [`BusError::ShuttingDown`].
    ///
    /// Do not await the returned future synchronously from inside a
    /// handler: the worker executing the handler is the one that would
    /// resolve it, so the wait deadlocks on a single-worker bus.
    pub async fn dispatch_result(&self, event: EventId, params: Params) -> DispatchFuture {
        if event == EventId::NONE {
            if self.core.debug_enabled() {
                debug!("no event specified for dispatch");
            }
            self.dispatch_error(BusError::InvalidEvent).await;
            return Future::preset(Err(BusError::InvalidEvent));
        }
        let future = DispatchFuture::new();
        let accepted = self
            .core
            .events()
            .push(Dispatch {
                event,
                params,
                future: future.clone(),
            })
            .await;
        if !accepted {
            future.resolve(Err(BusError::ShuttingDown));
        }
        if self.core.debug_enabled() {
            debug!(event = %event, accepted, "event published to queue, returning future");
        }
        future
    }

    /// Publishes an error to [`EventId::ASYNC_ERROR`] subscribers.
    pub async fn dispatch_error(&self, err: BusError) {
        // Pushed directly rather than through `dispatch`: the event id is
        // never NONE here, and `dispatch` itself reports invalid events
        // through this method.
        let accepted = self
            .core
            .events()
            .push(Dispatch {
                event: EventId::ASYNC_ERROR,
                params: vec![param(err)],
                future: Future::symbolic(),
            })
            .await;
        if self.core.debug_enabled() {
            debug!(accepted, "error published to queue");
        }
    }

    /// Publishes a free-form failure message as an asynchronous error.
    pub async fn dispatch_failure(&self, msg: impl Into<String>) {
        self.dispatch_error(BusError::failure(msg)).await;
    }

    /// Registers `handler` under `id` for `event`.
    ///
    /// Re-registering an id replaces its handler; event bindings
    /// accumulate. Use [`EventBus::add_handled_event`] to bind further
    /// events to the same handler.
    pub async fn register(&self, id: impl Into<String>, event: EventId, handler: HandlerRef) {
        let id = id.into();
        if self.core.debug_enabled() {
            debug!(handler = %id, event = %event, "handler registered");
        }
        self.core.registry.register(id, event, handler).await;
    }

    /// Registers a closure as a handler; see [`HandlerFn`].
    pub async fn register_fn<F>(&self, id: impl Into<String>, event: EventId, f: F)
    where
        F: Fn(EventId, &[Option<Param>]) -> Result<(), BusError> + Send + Sync + 'static,
    {
        self.register(id, event, HandlerFn::arc(f)).await;
    }

    /// Subscribes `callback` to asynchronous errors.
    ///
    /// The callback receives every error the bus propagates: handler
    /// failures, no-handler reports, and explicitly dispatched errors.
    pub async fn register_error_handler<F>(&self, id: impl Into<String>, callback: F)
    where
        F: Fn(BusError) + Send + Sync + 'static,
    {
        let handler = HandlerFn::arc(move |_event, params: &[Option<Param>]| {
            let mut err: Option<BusError> = None;
            map_param(&mut err, params)?;
            if let Some(err) = err {
                callback(err);
            }
            Ok(())
        });
        self.register(id, EventId::ASYNC_ERROR, handler).await;
        if self.core.debug_enabled() {
            debug!("error handler registered");
        }
    }

    /// Stops and removes a handler, unbinding it from every event.
    ///
    /// No-op when the id isn't registered.
    pub async fn unregister(&self, id: &str) {
        self.core.registry.unregister(id).await;
        if self.core.debug_enabled() {
            debug!(handler = %id, "handler unregistered");
        }
    }

    /// Additionally binds a registered handler to `event`.
    pub async fn add_handled_event(&self, id: &str, event: EventId) -> Result<(), BusError> {
        self.core.registry.add_handled_event(id, event).await
    }

    /// Makes `id` the only handler currently bound to `event`.
    ///
    /// Handlers bound at the time of the call lose the event; handlers
    /// registered for it afterwards still bind.
    pub async fn set_handled_exclusive(&self, id: &str, event: EventId) -> Result<(), BusError> {
        self.core.registry.set_handled_exclusive(id, event).await
    }

    /// Unbinds a registered handler from `event`.
    pub async fn remove_handled_event(&self, id: &str, event: EventId) -> Result<(), BusError> {
        self.core.registry.remove_handled_event(id, event).await
    }

    /// Stops the bus without waiting for processing to finish.
    ///
    /// Accepted dispatches are still drained in the background; new pushes
    /// are rejected. Idempotent. Use [`EventBus::shutdown`] to also wait.
    pub fn stop(&self) {
        if self.core.debug_enabled() {
            debug!("event bus stop requested");
        }
        self.core.stop();
    }

    /// Blocks until the bus has fully shut down: queue drained, stream
    /// closed, every worker exited.
    pub async fn wait(&self) {
        if let Some(events) = self.core.events.get() {
            events.wait().await;
        }
        // Covers a bus that was never started; idempotent after start.
        self.core.workers.close();
        self.core.workers.wait().await;
    }

    /// Like [`EventBus::wait`] with a deadline.
    ///
    /// Returns `false` when the deadline elapsed first; shutdown keeps
    /// making progress in the background either way.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait()).await.is_ok()
    }

    /// [`EventBus::stop`] followed by [`EventBus::wait`].
    pub async fn shutdown(&self) {
        self.stop();
        self.wait().await;
    }

    /// [`EventBus::stop`] followed by [`EventBus::wait_timeout`].
    pub async fn shutdown_timeout(&self, timeout: Duration) -> bool {
        self.stop();
        self.wait_timeout(timeout).await
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

static INSTANCE: Mutex<Option<EventBus>> = Mutex::new(None);

/// Returns the process-wide bus, created with defaults on first access.
///
/// Useful when a single global bus keeps application components loosely
/// coupled. Use [`init_instance`] to configure it instead of the defaults.
pub fn instance() -> EventBus {
    INSTANCE.lock().get_or_insert_with(EventBus::new).clone()
}

/// Configures the global bus instance.
///
/// Only the very first initialization takes effect: returns `Ok(true)` when
/// this call created the instance, `Ok(false)` when it already existed (the
/// builder is then discarded). Check the flag to be sure your configuration
/// was the one applied.
pub fn init_instance(builder: BusBuilder) -> Result<bool, ConfigError> {
    let mut cell = INSTANCE.lock();
    if cell.is_some() {
        return Ok(false);
    }
    *cell = Some(builder.build()?);
    Ok(true)
}

/// Discards the global instance so the next access recreates it.
///
/// Only meant for test suites that need isolation between cases; any
/// previously obtained handle keeps addressing the old bus.
#[doc(hidden)]
pub fn reset_instance_for_tests() {
    *INSTANCE.lock() = None;
}
