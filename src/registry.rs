//! Registration table: handler id → handler, event → set of handler ids.
//!
//! Writers take the lock exclusively; the dispatch path takes it shared and
//! holds it for the duration of one dispatch, so the id set and the handler
//! map stay consistent while handlers run.

use std::collections::{HashMap, HashSet};

use tokio::sync::{RwLock, RwLockReadGuard};

use crate::error::BusError;
use crate::event::EventId;
use crate::handler::HandlerRef;

/// The two maps, only reachable through a [`Registry`] lock guard.
///
/// Invariant: every id in an event set is a key of the handler map.
#[derive(Default)]
pub(crate) struct Tables {
    handlers: HashMap<String, HandlerRef>,
    handled_events: HashMap<EventId, HashSet<String>>,
}

impl Tables {
    /// Ids bound to `event`, if any.
    pub(crate) fn handler_ids(&self, event: EventId) -> Option<&HashSet<String>> {
        self.handled_events.get(&event)
    }

    /// Resolves an id from the same snapshot the id set came from.
    pub(crate) fn handler(&self, id: &str) -> Option<&HandlerRef> {
        self.handlers.get(id)
    }

    pub(crate) fn handlers(&self) -> impl Iterator<Item = &HandlerRef> {
        self.handlers.values()
    }
}

pub(crate) struct Registry {
    tables: RwLock<Tables>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Registry {
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Shared access for the dispatch path.
    pub(crate) async fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().await
    }

    /// Binds `handler` under `id` and adds `id` to the event's set.
    ///
    /// Re-registering an id replaces the handler; event bindings accumulate.
    pub(crate) async fn register(&self, id: String, event: EventId, handler: HandlerRef) {
        let mut tables = self.tables.write().await;
        tables
            .handled_events
            .entry(event)
            .or_default()
            .insert(id.clone());
        tables.handlers.insert(id, handler);
    }

    /// Stops and removes the handler, scrubbing it from every event set.
    ///
    /// No-op when the id isn't registered.
    pub(crate) async fn unregister(&self, id: &str) {
        let mut tables = self.tables.write().await;
        let Some(handler) = tables.handlers.remove(id) else {
            return;
        };
        handler.stop().await;
        for ids in tables.handled_events.values_mut() {
            ids.remove(id);
        }
    }

    /// Additionally binds a registered handler to `event`.
    pub(crate) async fn add_handled_event(&self, id: &str, event: EventId) -> Result<(), BusError> {
        let mut tables = self.tables.write().await;
        if !tables.handlers.contains_key(id) {
            return Err(BusError::UnknownHandler { id: id.to_string() });
        }
        tables
            .handled_events
            .entry(event)
            .or_default()
            .insert(id.to_string());
        Ok(())
    }

    /// Makes `id` the only handler currently bound to `event`.
    ///
    /// This removes the ids bound at the time of the call; it does not
    /// prevent later registrations on the same event.
    pub(crate) async fn set_handled_exclusive(
        &self,
        id: &str,
        event: EventId,
    ) -> Result<(), BusError> {
        let mut tables = self.tables.write().await;
        if !tables.handlers.contains_key(id) {
            return Err(BusError::UnknownHandler { id: id.to_string() });
        }
        tables
            .handled_events
            .insert(event, HashSet::from([id.to_string()]));
        Ok(())
    }

    /// Unbinds a registered handler from `event`.
    pub(crate) async fn remove_handled_event(
        &self,
        id: &str,
        event: EventId,
    ) -> Result<(), BusError> {
        let mut tables = self.tables.write().await;
        if !tables.handlers.contains_key(id) {
            return Err(BusError::UnknownHandler { id: id.to_string() });
        }
        if let Some(ids) = tables.handled_events.get_mut(&event) {
            ids.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerFn;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const EVENT_A: EventId = EventId(2);
    const EVENT_B: EventId = EventId(3);

    fn noop() -> HandlerRef {
        HandlerFn::arc(|_, _| Ok(()))
    }

    #[tokio::test]
    async fn register_binds_id_and_event() {
        let reg = Registry::new();
        reg.register("h".into(), EVENT_A, noop()).await;

        let tables = reg.read().await;
        assert!(tables.handler("h").is_some());
        assert!(tables.handler_ids(EVENT_A).expect("set exists").contains("h"));
    }

    #[tokio::test]
    async fn reregistration_replaces_handler_and_accumulates_events() {
        let reg = Registry::new();
        reg.register("h".into(), EVENT_A, noop()).await;
        reg.register("h".into(), EVENT_B, noop()).await;

        let tables = reg.read().await;
        assert!(tables.handler_ids(EVENT_A).expect("set").contains("h"));
        assert!(tables.handler_ids(EVENT_B).expect("set").contains("h"));
    }

    #[tokio::test]
    async fn unregister_stops_and_scrubs_every_set() {
        struct Counting(AtomicUsize);
        #[async_trait::async_trait]
        impl crate::handler::Handler for Counting {
            async fn handle_event(
                &self,
                _: EventId,
                _: &[Option<crate::params::Param>],
            ) -> Result<(), BusError> {
                Ok(())
            }
            async fn stop(&self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let handler = Arc::new(Counting(AtomicUsize::new(0)));
        let reg = Registry::new();
        reg.register("h".into(), EVENT_A, handler.clone()).await;
        reg.add_handled_event("h", EVENT_B).await.expect("registered");

        reg.unregister("h").await;
        assert_eq!(handler.0.load(Ordering::SeqCst), 1);

        let tables = reg.read().await;
        assert!(tables.handler("h").is_none());
        assert!(!tables.handler_ids(EVENT_A).expect("set").contains("h"));
        assert!(!tables.handler_ids(EVENT_B).expect("set").contains("h"));

        drop(tables);
        // Unknown ids are a no-op.
        reg.unregister("h").await;
    }

    #[tokio::test]
    async fn binding_operations_require_registration() {
        let reg = Registry::new();
        assert!(matches!(
            reg.add_handled_event("ghost", EVENT_A).await,
            Err(BusError::UnknownHandler { .. })
        ));
        assert!(matches!(
            reg.set_handled_exclusive("ghost", EVENT_A).await,
            Err(BusError::UnknownHandler { .. })
        ));
        assert!(matches!(
            reg.remove_handled_event("ghost", EVENT_A).await,
            Err(BusError::UnknownHandler { .. })
        ));
    }

    #[tokio::test]
    async fn exclusive_binding_is_point_in_time() {
        let reg = Registry::new();
        reg.register("first".into(), EVENT_A, noop()).await;
        reg.register("second".into(), EVENT_A, noop()).await;

        reg.set_handled_exclusive("first", EVENT_A)
            .await
            .expect("registered");
        {
            let tables = reg.read().await;
            let ids = tables.handler_ids(EVENT_A).expect("set");
            assert_eq!(ids.len(), 1);
            assert!(ids.contains("first"));
        }

        // A later registration on the same event still binds.
        reg.register("third".into(), EVENT_A, noop()).await;
        let tables = reg.read().await;
        assert_eq!(tables.handler_ids(EVENT_A).expect("set").len(), 2);
    }

    #[tokio::test]
    async fn remove_handled_event_unbinds_one_event() {
        let reg = Registry::new();
        reg.register("h".into(), EVENT_A, noop()).await;
        reg.add_handled_event("h", EVENT_B).await.expect("registered");
        reg.remove_handled_event("h", EVENT_A)
            .await
            .expect("registered");

        let tables = reg.read().await;
        assert!(!tables.handler_ids(EVENT_A).expect("set").contains("h"));
        assert!(tables.handler_ids(EVENT_B).expect("set").contains("h"));
        assert!(tables.handler("h").is_some(), "handler itself stays");
    }
}
