//! Dispatch records and the worker pool that drains the event stream.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::bus::BusCore;
use crate::error::BusError;
use crate::event::EventId;
use crate::future::Future;
use crate::params::{param, Params};

/// Result future handed back by
/// [`EventBus::dispatch_result`](crate::EventBus::dispatch_result): resolves
/// with the first error a handler reported, or `Ok(())`.
pub type DispatchFuture = Future<Result<(), BusError>>;

/// One queued unit of work: the event, its parameters, and the future the
/// consuming worker resolves exactly once.
pub(crate) struct Dispatch {
    pub(crate) event: EventId,
    pub(crate) params: Params,
    pub(crate) future: DispatchFuture,
}

/// One dispatch worker.
///
/// Loops over: flush locally buffered errors to error subscribers, then pull
/// the next dispatch from the shared stream. Errors are flushed at the top
/// of the loop rather than inline so error handlers can themselves publish
/// events without deadlocking the worker. On cancellation the worker stops
/// the bus once and keeps draining until the stream closes.
pub(crate) async fn worker(core: Arc<BusCore>, worker_num: usize, cancel: CancellationToken) {
    let mut pending: Vec<BusError> = Vec::new();
    let mut watch_cancel = true;
    loop {
        if !pending.is_empty() {
            flush_errors(&core, worker_num, &mut pending).await;
        }
        tokio::select! {
            _ = cancel.cancelled(), if watch_cancel => {
                if core.debug_enabled() {
                    debug!(worker = worker_num, "cancellation observed, stopping dispatch");
                }
                core.stop();
                // Only listen for the drain from here on.
                watch_cancel = false;
            }
            dispatch = core.events().recv() => {
                match dispatch {
                    Some(dispatch) => {
                        handle_dispatch(&core, worker_num, dispatch, &mut pending).await;
                    }
                    None => {
                        if core.debug_enabled() {
                            debug!(worker = worker_num, "dispatch stream closed, worker exiting");
                        }
                        break;
                    }
                }
            }
        }
    }
    stop_handlers(&core).await;
}

/// Routes one dispatch to its handler set under the shared registry lock.
async fn handle_dispatch(
    core: &BusCore,
    worker_num: usize,
    dispatch: Dispatch,
    pending: &mut Vec<BusError>,
) {
    if core.debug_enabled() {
        debug!(
            worker = worker_num,
            event = %dispatch.event,
            params = dispatch.params.len(),
            "received event for dispatching"
        );
    }
    let tables = core.registry().read().await;

    let ids = tables
        .handler_ids(dispatch.event)
        .filter(|ids| !ids.is_empty());
    let Some(ids) = ids else {
        if dispatch.event != EventId::ASYNC_ERROR {
            let err = BusError::NoHandler {
                event: dispatch.event,
            };
            if core.debug_enabled() {
                debug!(worker = worker_num, event = %dispatch.event, cause = err.as_label(), "no handlers found for event");
            }
            dispatch.future.resolve(Err(err.clone()));
            pending.push(err);
        }
        // An async-error event with no subscribers is dropped silently:
        // re-injecting it would recurse forever.
        dispatch.future.resolve(Ok(()));
        return;
    };

    for id in ids {
        let Some(handler) = tables.handler(id) else {
            if core.debug_enabled() {
                debug!(worker = worker_num, handler = %id, "handler missing from table, likely a bus bug");
            }
            continue;
        };
        let outcome = AssertUnwindSafe(handler.handle_event(dispatch.event, &dispatch.params))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                Err(BusError::failure(format!(
                    "handler '{id}' panicked while handling event {}",
                    dispatch.event
                )))
            });
        if let Err(err) = outcome {
            if core.debug_enabled() {
                debug!(worker = worker_num, handler = %id, error = %err, "handler returned error");
            }
            // First error wins the future; every error reaches the
            // async-error subscribers via the pending buffer.
            dispatch.future.resolve(Err(err.clone()));
            pending.push(BusError::HandlerFailed {
                id: id.clone(),
                event: dispatch.event,
                source: Arc::new(err),
            });
        }
    }
    dispatch.future.resolve(Ok(()));
}

/// Delivers buffered errors to every async-error subscriber.
///
/// Errors returned (or panics thrown) by error handlers are swallowed to
/// avoid unbounded recursion. The buffer is cleared even when no subscriber
/// is registered.
async fn flush_errors(core: &BusCore, worker_num: usize, pending: &mut Vec<BusError>) {
    if core.debug_enabled() {
        debug!(
            worker = worker_num,
            count = pending.len(),
            "dispatching errors from handlers"
        );
    }
    let tables = core.registry().read().await;
    let ids = tables
        .handler_ids(EventId::ASYNC_ERROR)
        .filter(|ids| !ids.is_empty());
    let Some(ids) = ids else {
        if core.debug_enabled() {
            debug!(worker = worker_num, "no registered error handlers");
        }
        pending.clear();
        return;
    };

    for err in pending.drain(..) {
        let params = vec![param(err)];
        for id in ids {
            let Some(handler) = tables.handler(id) else {
                continue;
            };
            let outcome = AssertUnwindSafe(handler.handle_event(EventId::ASYNC_ERROR, &params))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(herr)) => {
                    if core.debug_enabled() {
                        debug!(worker = worker_num, handler = %id, error = %herr, "error from error handler");
                    }
                }
                Err(_) => {
                    if core.debug_enabled() {
                        debug!(worker = worker_num, handler = %id, "error handler panicked");
                    }
                }
            }
        }
    }
}

/// Stops every registered handler, exactly once per bus shutdown.
async fn stop_handlers(core: &BusCore) {
    if !core.begin_handler_stop() {
        return;
    }
    let tables = core.registry().read().await;
    for handler in tables.handlers() {
        if AssertUnwindSafe(handler.stop()).catch_unwind().await.is_err() && core.debug_enabled() {
            debug!("handler panicked during stop");
        }
    }
}
