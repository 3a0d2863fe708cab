//! # ChannelQueue: a priority queue consumed as a channel stream.
//!
//! [`ChannelQueue`] wraps an [`OrderedQueue`] behind a bounded input channel
//! and a bounded output stream, with one mediator task moving values between
//! them. Producers block only while the input channel is full; the internal
//! queue grows as needed, so consumers always observe priority order without
//! a priority-aware bounded channel existing anywhere.
//!
//! ## Flow
//! ```text
//!  push / push_ranked ──► [input] ──► mediator ──► [output] ──► recv
//!                                       │  ▲
//!                                       ▼  │ (un-pop head when input races ahead)
//!                                  OrderedQueue
//! ```
//!
//! ## Shutdown
//! Cancelling the parent token (or calling [`ChannelQueue::stop`]) starts the
//! drain: pending input is swept non-blockingly, the input channel closes,
//! every queued value is flushed to the output, then the output closes. No
//! value accepted by `push` is ever lost; `push` reports `false` once
//! draining has begun and never blocks indefinitely after stop.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::ordered::{Entry, OrderedQueue};

/// Tuning knobs for a [`ChannelQueue`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ChannelQueueConfig {
    /// Buffered capacity of the input and output channels.
    ///
    /// Tokio channels hold at least one message, so `0` (the default) is
    /// treated as `1`.
    pub channel_size: usize,
    /// Starting capacity hint for the internal ordered queue.
    pub initial_buffer: usize,
}

/// Priority queue consumed as a channel-like stream.
pub struct ChannelQueue<T> {
    queue: Arc<OrderedQueue<T>>,
    input: mpsc::Sender<Entry<T>>,
    output: Mutex<mpsc::Receiver<T>>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl<T: Send + Sync + 'static> ChannelQueue<T> {
    /// Creates the queue and spawns its mediator task.
    ///
    /// The queue derives a child of `parent`, so cancelling the parent token
    /// triggers the drain just like [`ChannelQueue::stop`].
    ///
    /// Must be called within a Tokio runtime.
    pub fn new(parent: &CancellationToken, conf: ChannelQueueConfig) -> Self {
        let cancel = parent.child_token();
        let capacity = conf.channel_size.max(1);
        let queue = Arc::new(if conf.initial_buffer > 0 {
            OrderedQueue::with_capacity(conf.initial_buffer)
        } else {
            OrderedQueue::new()
        });

        let (input_tx, input_rx) = mpsc::channel(capacity);
        let (output_tx, output_rx) = mpsc::channel(capacity);

        let tracker = TaskTracker::new();
        tracker.spawn(mediate(
            Arc::clone(&queue),
            input_rx,
            output_tx,
            cancel.clone(),
        ));
        tracker.close();

        ChannelQueue {
            queue,
            input: input_tx,
            output: Mutex::new(output_rx),
            cancel,
            tracker,
        }
    }

    /// Pushes a value at the tail (priority `0`).
    ///
    /// Returns `false` when the queue is draining or stopped.
    pub async fn push(&self, value: T) -> bool {
        self.push_ranked(value, 0).await
    }

    /// Pushes a value by priority.
    ///
    /// Blocks while the input channel is full; returns `false` when the
    /// queue is draining or stopped.
    pub async fn push_ranked(&self, value: T, priority: u32) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.input.send(Entry { value, priority }).await.is_ok()
    }

    /// Receives the next value from the output stream.
    ///
    /// Returns `None` once the queue has stopped and fully drained. Any
    /// number of consumers may call this concurrently; each value is
    /// delivered to exactly one of them.
    pub async fn recv(&self) -> Option<T> {
        self.output.lock().await.recv().await
    }

    /// Best-effort non-blocking pop from the output stream.
    pub fn try_pop(&self) -> Option<T> {
        self.output.try_lock().ok()?.try_recv().ok()
    }

    /// Queue length, excluding values already handed to the output channel.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Starts the drain; idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Blocks until the mediator has finished draining and the output is
    /// closed.
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }

    /// [`ChannelQueue::stop`] followed by [`ChannelQueue::wait`].
    pub async fn shutdown(&self) {
        self.stop();
        self.wait().await;
    }
}

async fn mediate<T: Send>(
    queue: Arc<OrderedQueue<T>>,
    mut input: mpsc::Receiver<Entry<T>>,
    output: mpsc::Sender<T>,
    cancel: CancellationToken,
) {
    loop {
        match queue.pop_entry() {
            Some(head) => {
                tokio::select! {
                    received = input.recv() => {
                        // Input raced ahead of the output: restore the head
                        // so a higher-priority arrival can preempt it.
                        queue.push_head(head);
                        match received {
                            Some(entry) => queue.push_entry(entry),
                            None => break,
                        }
                    }
                    permit = output.reserve() => {
                        match permit {
                            Ok(permit) => permit.send(head.value),
                            // Consumer side is gone; nothing left to drain for.
                            Err(_) => return,
                        }
                    }
                    _ = cancel.cancelled() => {
                        queue.push_head(head);
                        break;
                    }
                }
            }
            None => {
                tokio::select! {
                    received = input.recv() => match received {
                        Some(entry) => queue.push_entry(entry),
                        None => break,
                    },
                    _ = cancel.cancelled() => break,
                }
            }
        }
    }

    // Draining: sweep whatever already made it into the input channel,
    // close it, sweep the stragglers that raced the close, then flush the
    // backlog to the output. Dropping the sender closes the stream.
    while let Ok(entry) = input.try_recv() {
        queue.push_entry(entry);
    }
    input.close();
    while let Ok(entry) = input.try_recv() {
        queue.push_entry(entry);
    }
    while let Some(value) = queue.pop() {
        if output.send(value).await.is_err() {
            return;
        }
    }
}
