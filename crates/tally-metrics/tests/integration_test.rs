//! Integration tests for tally-metrics crate.
//!
//! These tests drive the engine end to end through its public API: loading
//! events into a repository, aggregating, and running both controllers.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tally_common::test_utils::{event_fixtures, init_test_logging, reference_now};
use tally_common::{EntityId, Event, EventType, Result, TallyError};
use tally_config::Config;
use tally_metrics::{
    EntityLabels, EventRepository, FixedClock, InMemoryEventRepository, LoadStatus, MetricsEngine,
    ToggleOutcome,
};
use tokio::sync::Semaphore;

fn seeded_repository() -> InMemoryEventRepository {
    let now = reference_now();
    let repository = InMemoryEventRepository::new();
    repository.extend(event_fixtures::events_days_ago("P1", EventType::View, now, 0, 3));
    repository.extend(event_fixtures::events_days_ago("P1", EventType::View, now, 5, 2));
    repository.extend(event_fixtures::events_days_ago("P1", EventType::Share, now, 0, 1));
    repository.extend(event_fixtures::events_days_ago("P2", EventType::View, now, 0, 1));
    repository
}

fn engine<R: EventRepository + 'static>(repository: R) -> MetricsEngine {
    init_test_logging();
    MetricsEngine::from_config(
        &Config::default(),
        repository,
        Arc::new(FixedClock::new(reference_now())),
    )
    .unwrap()
}

/// Repository that parks queries for chosen entities until released.
struct GatedRepository {
    inner: InMemoryEventRepository,
    gated: parking_lot::Mutex<HashSet<EntityId>>,
    gate: Semaphore,
}

impl GatedRepository {
    fn new(inner: InMemoryEventRepository, gated: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            inner,
            gated: parking_lot::Mutex::new(gated.iter().map(|id| EntityId::from(*id)).collect()),
            gate: Semaphore::new(0),
        })
    }

    fn open(&self) {
        self.gate.close();
    }
}

#[async_trait]
impl EventRepository for GatedRepository {
    async fn query_by_entity(&self, entity_id: &EntityId) -> Result<Vec<Event>> {
        let gated = self.gated.lock().contains(entity_id);
        if gated {
            let _ = self.gate.acquire().await;
        }
        self.inner.query_by_entity(entity_id).await
    }
}

#[tokio::test]
async fn test_single_entity_end_to_end() {
    let engine = engine(seeded_repository());
    let controller = engine.single_entity();

    controller.select(Some(EntityId::from("P1"))).unwrap();
    let view = controller.settled().await.unwrap();

    assert_eq!(view.status, LoadStatus::Ready);
    let metrics = view.metrics.unwrap();
    assert_eq!(metrics.total_views, 5);
    assert_eq!(metrics.total_shares, 1);
    assert_eq!(metrics.total_contact_clicks, 0);
    assert_eq!(metrics.views_by_date.len(), 30);
    assert_eq!(metrics.views_by_date[29].count, 3);
    assert_eq!(metrics.views_by_date[24].count, 2);
    assert_eq!(metrics.recent_events.len(), 6);
}

#[tokio::test]
async fn test_comparison_end_to_end() {
    let engine = engine(seeded_repository());
    let controller = engine.comparison();
    controller
        .set_labels(EntityLabels::new().with("P2", "Acme"))
        .unwrap();

    assert_eq!(controller.toggle(EntityId::from("P1")).unwrap(), ToggleOutcome::Added);
    assert_eq!(controller.toggle(EntityId::from("P2")).unwrap(), ToggleOutcome::Added);
    let view = controller.settled().await.unwrap();

    let today = reference_now().date_naive();
    let row = view.rows.iter().find(|row| row.date == today).unwrap();
    assert_eq!(row.count_for("P1"), 3);
    assert_eq!(row.count_for("Acme"), 1);
    assert!(view
        .rows
        .iter()
        .filter(|row| row.date != today)
        .all(|row| row.metric_by_entity.values().all(|&count| count <= 2)));
}

#[tokio::test]
async fn test_selection_capacity() {
    let engine = engine(InMemoryEventRepository::new());
    let controller = engine.comparison();

    for raw in ["P1", "P2", "P3", "P4"] {
        controller.toggle(EntityId::from(raw)).unwrap();
    }
    assert_eq!(
        controller.toggle(EntityId::from("P5")).unwrap(),
        ToggleOutcome::AtCapacity
    );

    let view = controller.settled().await.unwrap();
    let selected: Vec<&str> = view.selection.iter().map(EntityId::as_str).collect();
    assert_eq!(selected, vec!["P1", "P2", "P3", "P4"]);
}

#[tokio::test]
async fn test_slow_removed_entity_never_reappears() {
    let now = reference_now();
    let inner = seeded_repository();
    inner.extend(event_fixtures::events_days_ago("B", EventType::View, now, 0, 9));
    inner.extend(event_fixtures::events_days_ago("C", EventType::View, now, 1, 4));
    let repository = GatedRepository::new(inner, &["B"]);

    let engine = engine(Arc::clone(&repository));
    let controller = engine.comparison();

    controller.set_selection([EntityId::from("P1"), EntityId::from("B")]).unwrap();
    tokio::task::yield_now().await;

    controller.toggle(EntityId::from("B")).unwrap();
    controller.toggle(EntityId::from("C")).unwrap();
    let view = controller.settled().await.unwrap();
    assert!(!view.data.contains_key(&EntityId::from("B")));

    repository.open();
    tokio::time::timeout(Duration::from_secs(5), async {
        while controller.discarded_generations() < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();

    let view = controller.view();
    let selected: Vec<&str> = view.selection.iter().map(EntityId::as_str).collect();
    assert_eq!(selected, vec!["P1", "C"]);
    assert!(!view.data.contains_key(&EntityId::from("B")));
    assert!(view
        .rows
        .iter()
        .all(|row| !row.metric_by_entity.contains_key("B")));
}

#[tokio::test]
async fn test_no_data_is_distinct_from_failure() {
    struct Failing;

    #[async_trait]
    impl EventRepository for Failing {
        async fn query_by_entity(&self, entity_id: &EntityId) -> Result<Vec<Event>> {
            if entity_id.as_str() == "broken" {
                Err(TallyError::transport(entity_id.clone(), "connection refused"))
            } else {
                Ok(Vec::new())
            }
        }
    }

    let mut config = Config::default();
    config.fetch.max_retries = 0;
    let engine = MetricsEngine::from_config(
        &config,
        Failing,
        Arc::new(FixedClock::new(reference_now())),
    )
    .unwrap();

    let controller = engine.single_entity();
    controller.select(Some(EntityId::from("quiet"))).unwrap();
    let quiet = controller.settled().await.unwrap();
    assert_eq!(quiet.status, LoadStatus::Ready);
    assert!(!quiet.metrics.unwrap().has_events());

    controller.select(Some(EntityId::from("broken"))).unwrap();
    let broken = controller.settled().await.unwrap();
    assert_eq!(broken.status, LoadStatus::Failed);
    assert!(broken.metrics.is_none());
    assert!(broken.error.is_some());
}
