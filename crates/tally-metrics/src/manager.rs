//! Engine facade wiring configuration, repository and clock into controllers.

use crate::{
    AggregatedMetrics, AggregationConfig, Clock, ComparisonController, EventRepository, FetchPolicy,
    MetricsAggregator, RetryingRepository, SingleEntityController, SystemClock,
};
use std::sync::Arc;
use tally_common::{EntityId, Result};
use tally_config::Config;
use tracing::{debug, info, instrument};

/// Builds controllers that share one repository, aggregator and clock.
///
/// Controllers created here share no mutable state with each other.
#[derive(Clone)]
pub struct MetricsEngine {
    repository: Arc<dyn EventRepository>,
    aggregator: MetricsAggregator,
    clock: Arc<dyn Clock>,
    max_entities: usize,
}

impl std::fmt::Debug for MetricsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsEngine")
            .field("aggregator", &self.aggregator)
            .field("max_entities", &self.max_entities)
            .finish_non_exhaustive()
    }
}

impl MetricsEngine {
    /// Creates an engine from a validated configuration.
    ///
    /// `repository` is wrapped in the configured timeout and retry policy.
    pub fn from_config<R>(config: &Config, repository: R, clock: Arc<dyn Clock>) -> Result<Self>
    where
        R: EventRepository + 'static,
    {
        config.validate()?;
        let aggregation = AggregationConfig::try_from(&config.metrics)?;
        let policy = FetchPolicy::from(&config.fetch);

        info!(
            window_days = aggregation.window_days.get(),
            recent_events_limit = aggregation.recent_events_limit,
            max_entities = config.comparison.max_entities,
            timeout_ms = config.fetch.timeout_ms,
            max_retries = policy.max_retries,
            "Metrics engine configured"
        );

        Ok(Self {
            repository: Arc::new(RetryingRepository::new(repository, policy)),
            aggregator: MetricsAggregator::new(aggregation),
            clock,
            max_entities: config.comparison.max_entities,
        })
    }

    /// Creates an engine with default configuration and the wall clock.
    pub fn with_defaults<R>(repository: R) -> Result<Self>
    where
        R: EventRepository + 'static,
    {
        Self::from_config(&Config::default(), repository, Arc::new(SystemClock))
    }

    /// Aggregator shared by the controllers.
    #[must_use]
    pub const fn aggregator(&self) -> &MetricsAggregator {
        &self.aggregator
    }

    /// Comparison capacity.
    #[must_use]
    pub const fn max_entities(&self) -> usize {
        self.max_entities
    }

    /// A new, idle single-entity controller.
    #[must_use]
    pub fn single_entity(&self) -> SingleEntityController {
        SingleEntityController::new(
            Arc::clone(&self.repository),
            self.aggregator.clone(),
            Arc::clone(&self.clock),
        )
    }

    /// A new comparison controller with an empty selection.
    #[must_use]
    pub fn comparison(&self) -> ComparisonController {
        ComparisonController::new(
            Arc::clone(&self.repository),
            self.aggregator.clone(),
            Arc::clone(&self.clock),
            self.max_entities,
        )
    }

    /// Fetches and aggregates one entity without a controller.
    #[instrument(skip(self), fields(entity = %entity_id))]
    pub async fn entity_metrics(&self, entity_id: &EntityId) -> Result<AggregatedMetrics> {
        let now = self.clock.now();
        let events = self.repository.query_by_entity(entity_id).await?;
        debug!(events = events.len(), "Aggregating entity");
        Ok(self.aggregator.aggregate(entity_id, &events, now))
    }
}
