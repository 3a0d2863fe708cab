//! # Resolve-once futures with cached re-reads.
//!
//! [`Future`] carries one asynchronous result from a producer to any number
//! of consumers:
//!
//! - [`Future::resolve`] publishes the value; only the first call wins.
//! - [`Future::wait`] blocks until the value is available, then returns a
//!   clone of it. Late waiters observe the same value the first one did.
//!
//! ## Flavors
//! - [`Future::new`] — the shared resolve-once cell.
//! - [`Future::symbolic`] — inert; `resolve` discards, `wait` yields nothing.
//!   Used when a publisher does not care about the result, so no cell or
//!   waker is allocated.
//! - [`Future::preset`] — already resolved; `resolve` is ignored.
//!
//! The shared flavor is a [`OnceLock`] cell guarded by a [`Notify`] barrier:
//! the cell is written exactly once, the barrier wakes current waiters, and
//! every reader re-checks the cell around waiter registration so a
//! resolution can never slip between the check and the sleep.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::{oneshot, Notify};

/// Single-shot asynchronous result carrier.
///
/// Cloning is cheap and every clone observes the same resolution.
pub struct Future<T> {
    kind: Kind<T>,
}

enum Kind<T> {
    Symbolic,
    Static(T),
    Shared(Arc<Shared<T>>),
}

struct Shared<T> {
    slot: OnceLock<T>,
    ready: Notify,
}

impl<T> Shared<T> {
    async fn wait(&self) -> &T {
        loop {
            if let Some(v) = self.slot.get() {
                return v;
            }
            let notified = self.ready.notified();
            // Re-check: a resolver may have won between the first check and
            // waiter registration.
            if let Some(v) = self.slot.get() {
                return v;
            }
            notified.await;
        }
    }
}

impl<T> Future<T> {
    /// Creates an unresolved future.
    pub fn new() -> Self {
        Future {
            kind: Kind::Shared(Arc::new(Shared {
                slot: OnceLock::new(),
                ready: Notify::new(),
            })),
        }
    }

    /// Creates an inert future for fire-and-forget dispatches.
    pub fn symbolic() -> Self {
        Future {
            kind: Kind::Symbolic,
        }
    }

    /// Creates a future already resolved with `value`.
    pub fn preset(value: T) -> Self {
        Future {
            kind: Kind::Static(value),
        }
    }

    /// Publishes the result.
    ///
    /// Only the first call succeeds; arguments of later callers are
    /// discarded without any error signal.
    pub fn resolve(&self, value: T) {
        if let Kind::Shared(shared) = &self.kind {
            if shared.slot.set(value).is_ok() {
                shared.ready.notify_waiters();
            }
        }
    }
}

impl<T: Clone> Future<T> {
    /// Blocks until the future is resolved and returns the value.
    ///
    /// Returns `None` only for the symbolic flavor.
    pub async fn wait(&self) -> Option<T> {
        match &self.kind {
            Kind::Symbolic => None,
            Kind::Static(v) => Some(v.clone()),
            Kind::Shared(shared) => Some(shared.wait().await.clone()),
        }
    }

    /// Like [`Future::wait`], but gives up after `timeout`.
    ///
    /// Returns `None` when the deadline elapses before resolution. The
    /// future stays valid and can be awaited again.
    pub async fn wait_timeout(&self, timeout: Duration) -> Option<T> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .ok()
            .flatten()
    }
}

impl<T: Clone + Send + Sync + 'static> Future<T> {
    /// Channel adaptor: yields a one-shot receiver of the awaited value.
    ///
    /// Spawns one helper task; for a symbolic future the sender is dropped
    /// unsent and the receiver reports closure.
    ///
    /// Must be called within a Tokio runtime.
    pub fn subscribe(&self) -> oneshot::Receiver<T> {
        let (tx, rx) = oneshot::channel();
        let fut = self.clone();
        tokio::spawn(async move {
            if let Some(v) = fut.wait().await {
                let _ = tx.send(v);
            }
        });
        rx
    }
}

impl<T: Clone> Clone for Future<T> {
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            Kind::Symbolic => Kind::Symbolic,
            Kind::Static(v) => Kind::Static(v.clone()),
            Kind::Shared(shared) => Kind::Shared(Arc::clone(shared)),
        };
        Future { kind }
    }
}

impl<T> Default for Future<T> {
    fn default() -> Self {
        Future::new()
    }
}

// Manual impl keeps T: Debug off the public bounds.
impl<T> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Symbolic => f.write_str("Future::Symbolic"),
            Kind::Static(_) => f.write_str("Future::Static"),
            Kind::Shared(shared) => f
                .debug_struct("Future")
                .field("resolved", &shared.slot.get().is_some())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_then_wait() {
        let fut = Future::new();
        fut.resolve(7u32);
        assert_eq!(fut.wait().await, Some(7));
    }

    #[tokio::test]
    async fn first_resolve_wins() {
        let fut = Future::new();
        fut.resolve("first");
        fut.resolve("second");
        assert_eq!(fut.wait().await, Some("first"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_resolvers_agree() {
        let fut = Future::new();
        let mut joins = Vec::new();
        for i in 0..10u32 {
            let f = fut.clone();
            joins.push(tokio::spawn(async move {
                f.resolve(i);
                f.wait().await.expect("shared future resolves")
            }));
        }
        let winner = fut.wait().await.expect("resolved");
        for j in joins {
            assert_eq!(j.await.expect("task join"), winner);
        }
    }

    #[tokio::test]
    async fn late_waiters_read_cache() {
        let fut = Future::new();
        fut.resolve(1u8);
        assert_eq!(fut.wait().await, Some(1));
        // The value is cached, not consumed.
        assert_eq!(fut.wait().await, Some(1));
        assert_eq!(fut.clone().wait().await, Some(1));
    }

    #[tokio::test]
    async fn timeout_returns_none() {
        let fut: Future<u32> = Future::new();
        assert_eq!(fut.wait_timeout(Duration::from_millis(10)).await, None);
        fut.resolve(3);
        assert_eq!(fut.wait_timeout(Duration::from_millis(10)).await, Some(3));
    }

    #[tokio::test]
    async fn symbolic_is_inert() {
        let fut = Future::symbolic();
        fut.resolve(9u32);
        assert_eq!(fut.wait().await, None);
    }

    #[tokio::test]
    async fn preset_ignores_resolve() {
        let fut = Future::preset("kept");
        fut.resolve("ignored");
        assert_eq!(fut.wait().await, Some("kept"));
    }

    #[tokio::test]
    async fn subscribe_yields_value_once() {
        let fut = Future::new();
        let rx = fut.subscribe();
        fut.resolve(11u64);
        assert_eq!(rx.await.expect("value sent"), 11);
    }

    #[tokio::test]
    async fn subscribe_on_symbolic_closes() {
        let fut: Future<u64> = Future::symbolic();
        let rx = fut.subscribe();
        assert!(rx.await.is_err());
    }
}
