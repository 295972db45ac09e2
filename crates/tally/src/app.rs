//! Runs one command against an events file and renders the result.

use crate::cli::{parse_label, Command};
use crate::{AppError, AppResult};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tally_common::{EntityId, Timestamp};
use tally_config::Config;
use tally_metrics::{
    Clock, ComparisonView, EntityLabels, EntityMetricsView, FixedClock, InMemoryEventRepository,
    LoadStatus, MetricsEngine, SystemClock,
};
use tracing::{info, instrument, warn};

/// Result of a command.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Report {
    /// Single-entity snapshot.
    Entity(EntityMetricsView),
    /// Comparison snapshot.
    Comparison(ComparisonView),
}

impl Report {
    /// Whether every fetch behind the report succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        match self {
            Self::Entity(view) => view.status == LoadStatus::Ready,
            Self::Comparison(view) => view.errors.is_empty(),
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Loads an events file into an in-memory repository.
pub fn load_events(path: &Path) -> AppResult<InMemoryEventRepository> {
    let file = File::open(path).map_err(|e| AppError::Events {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    let repository = InMemoryEventRepository::from_json(BufReader::new(file)).map_err(|source| AppError::Events {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        path = %path.display(),
        events = repository.len(),
        entities = repository.entities().len(),
        "Loaded events"
    );
    Ok(repository)
}

/// The wall clock, or a clock frozen at `now` when one is given.
#[must_use]
pub fn clock_at(now: Option<Timestamp>) -> Arc<dyn Clock> {
    match now {
        Some(now) => {
            info!(now = %now.to_rfc3339(), "Evaluating at a fixed time");
            Arc::new(FixedClock::new(now))
        }
        None => Arc::new(SystemClock),
    }
}

/// The engine bound to one configuration and event set.
#[derive(Debug)]
pub struct App {
    engine: MetricsEngine,
}

impl App {
    /// Creates the app with the wall clock.
    pub fn new(config: &Config, repository: InMemoryEventRepository) -> AppResult<Self> {
        Self::with_clock(config, repository, Arc::new(SystemClock))
    }

    /// Creates the app with an explicit clock.
    pub fn with_clock(
        config: &Config,
        repository: InMemoryEventRepository,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Self> {
        Ok(Self {
            engine: MetricsEngine::from_config(config, repository, clock)?,
        })
    }

    /// Runs `command` to completion.
    #[instrument(skip(self))]
    pub async fn run(&self, command: &Command) -> AppResult<Report> {
        match command {
            Command::Entity { id } => self.entity(EntityId::from(id.as_str())).await.map(Report::Entity),
            Command::Compare { ids, labels } => self.compare(ids, labels).await.map(Report::Comparison),
        }
    }

    async fn entity(&self, entity_id: EntityId) -> AppResult<EntityMetricsView> {
        let controller = self.engine.single_entity();
        controller.select(Some(entity_id))?;
        let view = controller.settled().await?;
        controller.shutdown();
        Ok(view)
    }

    async fn compare(&self, ids: &[String], labels: &[String]) -> AppResult<ComparisonView> {
        let labels = labels
            .iter()
            .map(|raw| parse_label(raw))
            .collect::<AppResult<EntityLabels>>()?;

        let controller = self.engine.comparison();
        controller.set_labels(labels)?;
        let selected = controller.set_selection(ids.iter().map(|id| EntityId::from(id.as_str())))?;
        if selected.len() < ids.len() {
            warn!(
                requested = ids.len(),
                compared = selected.len(),
                capacity = controller.capacity(),
                "Some entities were not compared"
            );
        }

        let view = controller.settled().await?;
        controller.shutdown();
        Ok(view)
    }
}
