//! Side-by-side comparison of up to `max_entities` entities.
//!
//! Each change of the selection starts a new generation: one task that
//! fetches and aggregates every selected entity concurrently, then applies
//! all results at once. A generation is applied only if it is still the
//! current one when its last fetch settles; otherwise its results are
//! dropped. In-flight fetches of older generations are left to finish.

use crate::{
    merge_rows, AggregatedMetrics, Clock, ComparisonRow, EntityLabels, EventRepository,
    MetricsAggregator, Selection, ToggleOutcome,
};
use arc_swap::ArcSwap;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tally_common::{EntityId, Result, TallyError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Snapshot of the comparison controller.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComparisonView {
    /// Selected entities in selection order.
    pub selection: Vec<EntityId>,
    /// Metrics of every selected entity whose last fetch succeeded.
    pub data: BTreeMap<EntityId, Arc<AggregatedMetrics>>,
    /// Date-aligned table over `data`.
    pub rows: Vec<ComparisonRow>,
    /// Per-entity fetch failures of the last applied generation.
    #[serde(serialize_with = "serialize_errors")]
    pub errors: BTreeMap<EntityId, Arc<TallyError>>,
    /// True while the current generation has not settled.
    pub is_loading: bool,
    /// Generation this snapshot belongs to.
    pub generation: u64,
}

impl ComparisonView {
    /// Whether `entity_id` failed in the last applied generation.
    #[must_use]
    pub fn failed(&self, entity_id: &EntityId) -> bool {
        self.errors.contains_key(entity_id)
    }
}

fn serialize_errors<S: Serializer>(
    errors: &BTreeMap<EntityId, Arc<TallyError>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_map(errors.iter().map(|(id, err)| (id, err.to_string())))
}

/// One fan-out cycle: its number and the selection it fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    /// Monotonic generation number.
    pub id: u64,
    /// Selection snapshot taken when the generation started.
    pub selection: Vec<EntityId>,
}

/// What happened to a generation's results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Merged into the view.
    Applied,
    /// A newer generation had started; results dropped.
    Stale,
    /// The controller was shut down; results dropped.
    Closed,
}

type FetchResult = (EntityId, Result<Arc<AggregatedMetrics>>);

struct State {
    selection: Selection,
    view: ComparisonView,
    tasks: Vec<JoinHandle<()>>,
    updates: Option<watch::Sender<ComparisonView>>,
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
}

struct Shared {
    repository: Arc<dyn EventRepository>,
    aggregator: MetricsAggregator,
    clock: Arc<dyn Clock>,
    labels: ArcSwap<EntityLabels>,
    state: Mutex<State>,
    latest: watch::Receiver<ComparisonView>,
    discarded: AtomicU64,
}

impl Shared {
    #[instrument(skip(self, generation), fields(generation = generation.id, entities = generation.selection.len()))]
    async fn run_generation(self: Arc<Self>, generation: Generation) {
        let now = self.clock.now();
        let fetches = generation.selection.iter().map(|entity_id| {
            let shared = &self;
            async move {
                let result = shared
                    .repository
                    .query_by_entity(entity_id)
                    .await
                    .map(|events| Arc::new(shared.aggregator.aggregate(entity_id, &events, now)));
                (entity_id.clone(), result)
            }
        });

        let results = join_all(fetches).await;
        let outcome = self.apply(&generation, results);
        debug!(?outcome, "Generation settled");
    }

    fn apply(&self, generation: &Generation, results: Vec<FetchResult>) -> GenerationOutcome {
        let mut state = self.state.lock();
        if state.is_closed() {
            return GenerationOutcome::Closed;
        }
        if state.view.generation != generation.id {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            debug!(
                generation = generation.id,
                current = state.view.generation,
                "Discarding stale generation"
            );
            return GenerationOutcome::Stale;
        }

        let mut data = BTreeMap::new();
        let mut errors = BTreeMap::new();
        for (entity_id, result) in results {
            match result {
                Ok(metrics) => {
                    data.insert(entity_id, metrics);
                }
                Err(err) => {
                    warn!(entity = %entity_id, "Comparison fetch failed: {}", err);
                    errors.insert(entity_id, Arc::new(err));
                }
            }
        }

        state.view.rows = merge_rows(&state.selection, &data, &self.labels.load());
        state.view.data = data;
        state.view.errors = errors;
        state.view.is_loading = false;
        state.publish();
        GenerationOutcome::Applied
    }
}

/// Owns the comparison selection and the per-entity results.
///
/// Methods that start a fetch must be called from within a Tokio runtime.
pub struct ComparisonController {
    shared: Arc<Shared>,
}

impl ComparisonController {
    /// Creates a controller with an empty selection of at most `max_entities`.
    pub fn new(
        repository: Arc<dyn EventRepository>,
        aggregator: MetricsAggregator,
        clock: Arc<dyn Clock>,
        max_entities: usize,
    ) -> Self {
        let (updates, latest) = watch::channel(ComparisonView::default());
        Self {
            shared: Arc::new(Shared {
                repository,
                aggregator,
                clock,
                labels: ArcSwap::from_pointee(EntityLabels::new()),
                state: Mutex::new(State {
                    selection: Selection::new(max_entities),
                    view: ComparisonView::default(),
                    tasks: Vec::new(),
                    updates: Some(updates),
                }),
                latest,
                discarded: AtomicU64::new(0),
            }),
        }
    }

    /// Adds or removes `entity_id`.
    ///
    /// Adding to a full selection is a no-op and starts no fetch.
    #[instrument(skip(self), fields(entity = %entity_id))]
    pub fn toggle(&self, entity_id: EntityId) -> Result<ToggleOutcome> {
        let mut state = self.shared.state.lock();
        if state.is_closed() {
            return Err(TallyError::Closed);
        }

        let outcome = state.selection.toggle(entity_id);
        if outcome.changed() {
            self.start_generation(&mut state);
        } else {
            debug!(capacity = state.selection.capacity(), "Selection full, toggle ignored");
        }
        Ok(outcome)
    }

    /// Replaces the selection with `ids`, in order, as a single change.
    ///
    /// Duplicates and ids beyond capacity are ignored. Returns the resulting
    /// selection.
    pub fn set_selection<I>(&self, ids: I) -> Result<Vec<EntityId>>
    where
        I: IntoIterator<Item = EntityId>,
    {
        let mut state = self.shared.state.lock();
        if state.is_closed() {
            return Err(TallyError::Closed);
        }

        let before = state.selection.clone();
        state.selection.clear();
        for id in ids {
            if !state.selection.contains(&id) {
                state.selection.toggle(id);
            }
        }

        if state.selection != before {
            self.start_generation(&mut state);
        }
        Ok(state.selection.as_slice().to_vec())
    }

    /// Empties the selection. Returns whether anything was selected.
    pub fn clear(&self) -> Result<bool> {
        let mut state = self.shared.state.lock();
        if state.is_closed() {
            return Err(TallyError::Closed);
        }
        let changed = state.selection.clear();
        if changed {
            self.start_generation(&mut state);
        }
        Ok(changed)
    }

    /// Fetches the current selection again as a new generation.
    ///
    /// Returns `false` when nothing is selected.
    pub fn refresh(&self) -> Result<bool> {
        let mut state = self.shared.state.lock();
        if state.is_closed() {
            return Err(TallyError::Closed);
        }
        if state.selection.is_empty() {
            return Ok(false);
        }
        self.start_generation(&mut state);
        Ok(true)
    }

    /// Replaces the display labels and rebuilds the rows.
    pub fn set_labels(&self, labels: EntityLabels) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.is_closed() {
            return Err(TallyError::Closed);
        }
        self.shared.labels.store(Arc::new(labels));
        state.view.rows = merge_rows(&state.selection, &state.view.data, &self.shared.labels.load());
        state.publish();
        Ok(())
    }

    fn start_generation(&self, state: &mut State) {
        state.view.generation += 1;
        let generation = Generation {
            id: state.view.generation,
            selection: state.selection.as_slice().to_vec(),
        };

        // Entities still selected keep their last results until the new
        // generation lands.
        let selection = &state.selection;
        state.view.data.retain(|id, _| selection.contains(id));
        state.view.errors.retain(|id, _| selection.contains(id));
        state.view.rows = merge_rows(&state.selection, &state.view.data, &self.shared.labels.load());
        state.view.selection = generation.selection.clone();
        state.view.is_loading = !generation.selection.is_empty();
        state.publish();

        state.tasks.retain(|task| !task.is_finished());
        if generation.selection.is_empty() {
            debug!(generation = generation.id, "Selection empty, nothing to fetch");
            return;
        }

        info!(generation = generation.id, entities = generation.selection.len(), "Starting comparison fetch");
        let shared = Arc::clone(&self.shared);
        state.tasks.push(tokio::spawn(shared.run_generation(generation)));
    }

    /// Current snapshot.
    #[must_use]
    pub fn view(&self) -> ComparisonView {
        self.shared.latest.borrow().clone()
    }

    /// Subscribes to snapshots. The receiver closes on shutdown.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ComparisonView> {
        self.shared.latest.clone()
    }

    /// Waits until the current generation has settled and returns that snapshot.
    pub async fn settled(&self) -> Result<ComparisonView> {
        if self.is_closed() {
            return Err(TallyError::Closed);
        }
        let mut updates = self.subscribe();
        let view = updates
            .wait_for(|view| !view.is_loading)
            .await
            .map_err(|_| TallyError::Closed)?;
        Ok(view.clone())
    }

    /// Number of generations whose results were dropped as stale.
    #[must_use]
    pub fn discarded_generations(&self) -> u64 {
        self.shared.discarded.load(Ordering::Relaxed)
    }

    /// Maximum number of selected entities.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.state.lock().selection.capacity()
    }

    /// Stops the controller and aborts every fetch task.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        if state.is_closed() {
            return;
        }
        state.updates = None;
        for task in state.tasks.drain(..) {
            task.abort();
        }
        debug!("Comparison controller shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().is_closed()
    }
}

impl Drop for ComparisonController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
