//! Event repository abstraction and the fetch policy wrapped around it.
//!
//! The engine reads events through [`EventRepository`] only. Persistence and
//! transport belong to whatever implements it.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tally_common::{EntityId, Event, Result, TallyError};
use tally_config::FetchConfig;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;
use tracing::{debug, instrument, warn};

/// Read-only access to stored events.
///
/// Implementations may return events in any order and report transport
/// failures as [`TallyError::Transport`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// All events recorded for `entity_id`.
    async fn query_by_entity(&self, entity_id: &EntityId) -> Result<Vec<Event>>;
}

#[async_trait]
impl<R: EventRepository + ?Sized> EventRepository for Arc<R> {
    async fn query_by_entity(&self, entity_id: &EntityId) -> Result<Vec<Event>> {
        (**self).query_by_entity(entity_id).await
    }
}

/// Event repository held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    events: RwLock<HashMap<EntityId, Vec<Event>>>,
}

impl InMemoryEventRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a repository from a JSON array of events.
    pub fn from_json<R: Read>(reader: R) -> Result<Self> {
        let events: Vec<Event> = serde_json::from_reader(reader)?;
        let repository = Self::new();
        repository.extend(events);
        Ok(repository)
    }

    /// Stores one event.
    pub fn append(&self, event: Event) {
        self.events
            .write()
            .entry(event.entity_id.clone())
            .or_default()
            .push(event);
    }

    /// Stores many events.
    pub fn extend<I: IntoIterator<Item = Event>>(&self, events: I) {
        let mut map = self.events.write();
        for event in events {
            map.entry(event.entity_id.clone()).or_default().push(event);
        }
    }

    /// Number of stored events across all entities.
    pub fn len(&self) -> usize {
        self.events.read().values().map(Vec::len).sum()
    }

    /// Whether no events are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entities with at least one stored event, sorted.
    pub fn entities(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.events.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn query_by_entity(&self, entity_id: &EntityId) -> Result<Vec<Event>> {
        let mut events = self.events.read().get(entity_id).cloned().unwrap_or_default();
        events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        Ok(events)
    }
}

const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Timeout and retry policy for repository calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Deadline for one attempt.
    pub timeout: Duration,
    /// Attempts after the first one.
    pub max_retries: usize,
    /// Delay before the first retry.
    pub retry_base_delay: Duration,
}

impl FetchPolicy {
    /// Backoff delays between attempts: the base delay, doubled each retry.
    fn backoff(&self) -> impl Iterator<Item = Duration> {
        let base_ms = u64::try_from(self.retry_base_delay.as_millis()).unwrap_or(u64::MAX);
        let first = Duration::from_millis(base_ms).min(MAX_RETRY_DELAY);
        std::iter::once(first)
            .chain(
                ExponentialBackoff::from_millis(2)
                    .factor(base_ms)
                    .max_delay(MAX_RETRY_DELAY),
            )
            .take(self.max_retries)
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self::from(&FetchConfig::default())
    }
}

impl From<&FetchConfig> for FetchPolicy {
    fn from(config: &FetchConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }
}

/// Repository decorator bounding every call by a deadline and retrying
/// transport failures with exponential backoff.
#[derive(Debug)]
pub struct RetryingRepository<R> {
    inner: R,
    policy: FetchPolicy,
}

impl<R: EventRepository> RetryingRepository<R> {
    /// Wraps `inner` in `policy`.
    pub const fn new(inner: R, policy: FetchPolicy) -> Self {
        Self { inner, policy }
    }

    /// Active policy.
    pub const fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Unwraps the inner repository.
    pub fn into_inner(self) -> R {
        self.inner
    }

    async fn attempt(&self, entity_id: &EntityId) -> Result<Vec<Event>> {
        match tokio::time::timeout(self.policy.timeout, self.inner.query_by_entity(entity_id)).await {
            Ok(result) => result,
            Err(_) => Err(TallyError::Timeout {
                entity_id: entity_id.clone(),
                after_ms: u64::try_from(self.policy.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

#[async_trait]
impl<R: EventRepository> EventRepository for RetryingRepository<R> {
    #[instrument(skip(self), fields(entity = %entity_id))]
    async fn query_by_entity(&self, entity_id: &EntityId) -> Result<Vec<Event>> {
        let result = RetryIf::spawn(
            self.policy.backoff(),
            || self.attempt(entity_id),
            |err: &TallyError| {
                let retry = err.is_transport();
                if retry {
                    debug!("Transient fetch failure: {}", err);
                }
                retry
            },
        )
        .await;

        match &result {
            Ok(events) => debug!(events = events.len(), "Fetched events"),
            Err(err) => warn!("Fetch failed: {}", err),
        }
        result
    }
}
