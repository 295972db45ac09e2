//! Scriptable repository for controller tests.
//!
//! Answers per entity can be set to events or a transport failure, and calls
//! for an entity can be held open until the test releases them. This is how
//! the controller tests reproduce slow and out-of-order fetches.

use crate::EventRepository;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tally_common::{EntityId, Event, Result, TallyError};
use tokio::sync::{Notify, Semaphore};

#[derive(Default)]
struct Script {
    events: HashMap<EntityId, Vec<Event>>,
    failures: HashMap<EntityId, String>,
    gates: HashMap<EntityId, Arc<Semaphore>>,
    calls: HashMap<EntityId, usize>,
    waiting: HashMap<EntityId, usize>,
}

/// In-memory repository whose answers are scripted per entity.
#[derive(Default)]
pub struct ScriptedRepository {
    script: Mutex<Script>,
    arrived: Notify,
}

impl ScriptedRepository {
    /// Creates an empty repository. Every entity answers with no events.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answers queries for `entity` with `events` and clears any failure.
    pub fn set_events(&self, entity: &str, events: Vec<Event>) {
        let mut script = self.script.lock();
        let id = EntityId::from(entity);
        script.failures.remove(&id);
        script.events.insert(id, events);
    }

    /// Answers queries for `entity` with a transport error.
    pub fn fail(&self, entity: &str, message: &str) {
        self.script
            .lock()
            .failures
            .insert(EntityId::from(entity), message.to_string());
    }

    /// Holds every query for `entity` until [`release`](Self::release).
    pub fn hold(&self, entity: &str) {
        self.script
            .lock()
            .gates
            .insert(EntityId::from(entity), Arc::new(Semaphore::new(0)));
    }

    /// Lets held queries for `entity` answer with the script as it is now.
    pub fn release(&self, entity: &str) {
        if let Some(gate) = self.script.lock().gates.remove(&EntityId::from(entity)) {
            gate.close();
        }
    }

    /// Number of queries issued for `entity` so far.
    pub fn calls_for(&self, entity: &str) -> usize {
        self.script
            .lock()
            .calls
            .get(&EntityId::from(entity))
            .copied()
            .unwrap_or(0)
    }

    /// Waits until a query for `entity` is parked on its hold.
    pub async fn wait_until_held(&self, entity: &str) {
        let id = EntityId::from(entity);
        loop {
            let arrived = self.arrived.notified();
            if self.script.lock().waiting.get(&id).copied().unwrap_or(0) > 0 {
                return;
            }
            arrived.await;
        }
    }
}

#[async_trait]
impl EventRepository for ScriptedRepository {
    async fn query_by_entity(&self, entity_id: &EntityId) -> Result<Vec<Event>> {
        let gate = {
            let mut script = self.script.lock();
            *script.calls.entry(entity_id.clone()).or_insert(0) += 1;
            let gate = script.gates.get(entity_id).cloned();
            if gate.is_some() {
                *script.waiting.entry(entity_id.clone()).or_insert(0) += 1;
            }
            gate
        };

        if let Some(gate) = gate {
            self.arrived.notify_waiters();
            // A closed gate means released.
            let _ = gate.acquire().await;
            if let Some(waiting) = self.script.lock().waiting.get_mut(entity_id) {
                *waiting = waiting.saturating_sub(1);
            }
        }

        let script = self.script.lock();
        if let Some(message) = script.failures.get(entity_id) {
            return Err(TallyError::transport(entity_id.clone(), message.clone()));
        }
        Ok(script.events.get(entity_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_common::test_utils::{event_fixtures, reference_now};

    #[tokio::test]
    async fn test_scripted_answers() {
        let repository = ScriptedRepository::new();
        repository.set_events("P1", event_fixtures::daily_views("P1", reference_now(), 2));
        repository.fail("P2", "backend down");

        let p1 = repository.query_by_entity(&EntityId::from("P1")).await.unwrap();
        assert_eq!(p1.len(), 2);

        let p2 = repository.query_by_entity(&EntityId::from("P2")).await.unwrap_err();
        assert!(p2.is_transport());

        assert_eq!(repository.calls_for("P1"), 1);
        assert_eq!(repository.calls_for("P3"), 0);
    }

    #[tokio::test]
    async fn test_hold_and_release() {
        let repository = ScriptedRepository::new();
        repository.hold("P1");

        let held = {
            let repository = Arc::clone(&repository);
            tokio::spawn(async move { repository.query_by_entity(&EntityId::from("P1")).await })
        };

        repository.wait_until_held("P1").await;
        assert!(!held.is_finished());

        repository.set_events("P1", event_fixtures::daily_views("P1", reference_now(), 1));
        repository.release("P1");

        let events = held.await.unwrap().unwrap();
        assert_eq!(events.len(), 1);
    }
}
