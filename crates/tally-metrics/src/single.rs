//! Controller for the metrics of one entity at a time.
//!
//! Every fetch runs as its own Tokio task tagged with a generation number.
//! Selecting another entity or refreshing aborts the running task and bumps
//! the generation, so a late answer can never overwrite a newer one.
//! Consumers read immutable [`EntityMetricsView`] snapshots, either on demand
//! or through a `watch` subscription.

use crate::{AggregatedMetrics, Clock, EventRepository, MetricsAggregator};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tally_common::{EntityId, Result, TallyError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Lifecycle of the single-entity view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    /// No entity selected.
    #[default]
    Idle,
    /// A fetch is in flight.
    Loading,
    /// The last fetch succeeded.
    Ready,
    /// The last fetch failed.
    Failed,
}

/// Snapshot of the single-entity controller.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EntityMetricsView {
    /// Selected entity, if any.
    pub entity_id: Option<EntityId>,
    /// Lifecycle state.
    pub status: LoadStatus,
    /// Latest successful aggregation for `entity_id`.
    ///
    /// Kept while a refresh is loading and after a failed fetch.
    pub metrics: Option<Arc<AggregatedMetrics>>,
    /// Error of the last fetch when `status` is `Failed`.
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<Arc<TallyError>>,
    /// Fetch generation this snapshot belongs to.
    pub generation: u64,
}

impl EntityMetricsView {
    /// Whether a fetch is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status == LoadStatus::Loading
    }

    /// Whether the metrics shown are older than the last attempt.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.status == LoadStatus::Failed && self.metrics.is_some()
    }
}

fn serialize_error<S: serde::Serializer>(
    error: &Option<Arc<TallyError>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match error {
        Some(error) => serializer.serialize_some(&error.to_string()),
        None => serializer.serialize_none(),
    }
}

struct State {
    view: EntityMetricsView,
    task: Option<JoinHandle<()>>,
    updates: Option<watch::Sender<EntityMetricsView>>,
}

impl State {
    const fn is_closed(&self) -> bool {
        self.updates.is_none()
    }

    fn publish(&self) {
        if let Some(updates) = &self.updates {
            updates.send_replace(self.view.clone());
        }
    }

    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Shared {
    repository: Arc<dyn EventRepository>,
    aggregator: MetricsAggregator,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
    latest: watch::Receiver<EntityMetricsView>,
}

impl Shared {
    async fn fetch(self: Arc<Self>, entity_id: EntityId, generation: u64) {
        let now = self.clock.now();
        let result = self
            .repository
            .query_by_entity(&entity_id)
            .await
            .map(|events| self.aggregator.aggregate(&entity_id, &events, now));
        self.apply(generation, result);
    }

    fn apply(&self, generation: u64, result: Result<AggregatedMetrics>) {
        let mut state = self.state.lock();
        if state.is_closed() {
            return;
        }
        if state.view.generation != generation {
            debug!(generation, current = state.view.generation, "Discarding stale fetch result");
            return;
        }

        match result {
            Ok(metrics) => {
                debug!(total_views = metrics.total_views, "Entity metrics ready");
                state.view.status = LoadStatus::Ready;
                state.view.metrics = Some(Arc::new(metrics));
                state.view.error = None;
            }
            Err(err) => {
                warn!(stale_data = state.view.metrics.is_some(), "Entity metrics fetch failed: {}", err);
                state.view.status = LoadStatus::Failed;
                state.view.error = Some(Arc::new(err));
            }
        }
        state.task = None;
        state.publish();
    }
}

/// Fetches and aggregates metrics for the selected entity.
///
/// Methods that start a fetch must be called from within a Tokio runtime.
pub struct SingleEntityController {
    shared: Arc<Shared>,
}

impl SingleEntityController {
    /// Creates an idle controller.
    pub fn new(
        repository: Arc<dyn EventRepository>,
        aggregator: MetricsAggregator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (updates, latest) = watch::channel(EntityMetricsView::default());
        Self {
            shared: Arc::new(Shared {
                repository,
                aggregator,
                clock,
                state: Mutex::new(State {
                    view: EntityMetricsView::default(),
                    task: None,
                    updates: Some(updates),
                }),
                latest,
            }),
        }
    }

    /// Selects an entity, or none.
    ///
    /// Any fetch in flight is aborted. Selecting a different entity drops the
    /// metrics shown for the previous one; `None` returns to `Idle`.
    #[instrument(skip(self))]
    pub fn select(&self, entity_id: Option<EntityId>) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.is_closed() {
            return Err(TallyError::Closed);
        }
        state.abort_task();
        state.view.generation += 1;

        let Some(entity_id) = entity_id else {
            state.view.entity_id = None;
            state.view.status = LoadStatus::Idle;
            state.view.metrics = None;
            state.view.error = None;
            state.publish();
            return Ok(());
        };

        if state.view.entity_id.as_ref() != Some(&entity_id) {
            state.view.metrics = None;
        }
        info!("Loading entity metrics");
        self.start_fetch(&mut state, entity_id);
        Ok(())
    }

    /// Fetches the selected entity again, keeping the current metrics visible
    /// until the new result replaces them.
    ///
    /// Returns `false` when no entity is selected.
    #[instrument(skip(self))]
    pub fn refresh(&self) -> Result<bool> {
        let mut state = self.shared.state.lock();
        if state.is_closed() {
            return Err(TallyError::Closed);
        }
        let Some(entity_id) = state.view.entity_id.clone() else {
            return Ok(false);
        };

        state.abort_task();
        state.view.generation += 1;
        debug!(entity = %entity_id, "Refreshing entity metrics");
        self.start_fetch(&mut state, entity_id);
        Ok(true)
    }

    fn start_fetch(&self, state: &mut State, entity_id: EntityId) {
        state.view.entity_id = Some(entity_id.clone());
        state.view.status = LoadStatus::Loading;
        state.view.error = None;
        state.publish();

        let generation = state.view.generation;
        let shared = Arc::clone(&self.shared);
        state.task = Some(tokio::spawn(shared.fetch(entity_id, generation)));
    }

    /// Current snapshot.
    #[must_use]
    pub fn view(&self) -> EntityMetricsView {
        self.shared.latest.borrow().clone()
    }

    /// Subscribes to snapshots. The receiver closes on shutdown.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<EntityMetricsView> {
        self.shared.latest.clone()
    }

    /// Waits until no fetch is in flight and returns that snapshot.
    pub async fn settled(&self) -> Result<EntityMetricsView> {
        if self.is_closed() {
            return Err(TallyError::Closed);
        }
        let mut updates = self.subscribe();
        let view = updates
            .wait_for(|view| !view.is_loading())
            .await
            .map_err(|_| TallyError::Closed)?;
        Ok(view.clone())
    }

    /// Stops the controller. Nothing updates the view afterwards.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        if state.is_closed() {
            return;
        }
        state.abort_task();
        state.updates = None;
        debug!("Single-entity controller shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().is_closed()
    }
}

impl Drop for SingleEntityController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
