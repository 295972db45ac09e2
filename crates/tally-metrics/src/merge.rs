//! Date-aligned merge of several entities' daily view series.

use crate::{AggregatedMetrics, Selection};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tally_common::EntityId;

/// One date of a comparison table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonRow {
    /// Calendar day (UTC).
    pub date: NaiveDate,
    /// View count per entity, keyed by display label.
    pub metric_by_entity: BTreeMap<String, u32>,
}

impl ComparisonRow {
    /// Count for `label`, zero when absent.
    #[must_use]
    pub fn count_for(&self, label: &str) -> u32 {
        self.metric_by_entity.get(label).copied().unwrap_or(0)
    }
}

/// Display labels for entities. Unlabelled entities display as their id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityLabels {
    labels: HashMap<EntityId, String>,
}

impl EntityLabels {
    /// No labels; every entity displays as its id.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, id: impl Into<EntityId>, label: impl Into<String>) -> Self {
        self.insert(id, label);
        self
    }

    /// Sets the label of `id`.
    pub fn insert(&mut self, id: impl Into<EntityId>, label: impl Into<String>) {
        self.labels.insert(id.into(), label.into());
    }

    /// Label for `id`, falling back to the id itself.
    #[must_use]
    pub fn label_for<'a>(&'a self, id: &'a EntityId) -> &'a str {
        self.labels.get(id).map_or(id.as_str(), String::as_str)
    }
}

impl<I: Into<EntityId>, L: Into<String>> FromIterator<(I, L)> for EntityLabels {
    fn from_iter<T: IntoIterator<Item = (I, L)>>(iter: T) -> Self {
        let mut labels = Self::new();
        for (id, label) in iter {
            labels.insert(id, label);
        }
        labels
    }
}

/// Column key for each selected entity that has data, in selection order.
///
/// Two entities sharing a label are told apart by appending the id. A key
/// that is still taken falls back to the id, then to a numbered id, so every
/// included entity gets its own column.
fn column_keys(
    selection: &Selection,
    data: &BTreeMap<EntityId, Arc<AggregatedMetrics>>,
    labels: &EntityLabels,
) -> Vec<(EntityId, String)> {
    let included: Vec<&EntityId> = selection.iter().filter(|id| data.contains_key(*id)).collect();

    let mut seen: HashMap<&str, usize> = HashMap::new();
    for id in &included {
        *seen.entry(labels.label_for(id)).or_insert(0) += 1;
    }

    let mut taken: HashSet<String> = HashSet::with_capacity(included.len());
    included
        .into_iter()
        .map(|id| {
            let label = labels.label_for(id);
            let mut key = if seen.get(label).copied().unwrap_or(0) > 1 {
                format!("{label} ({id})")
            } else {
                label.to_string()
            };
            let mut attempt = 1;
            while taken.contains(&key) {
                key = if attempt == 1 {
                    id.to_string()
                } else {
                    format!("{id} #{attempt}")
                };
                attempt += 1;
            }
            taken.insert(key.clone());
            (id.clone(), key)
        })
        .collect()
}

/// Builds the comparison table for the selected entities.
///
/// Dates are the union of every included series, ascending. Selected entities
/// without data (failed or not yet loaded) are left out of every row.
#[must_use]
pub fn merge_rows(
    selection: &Selection,
    data: &BTreeMap<EntityId, Arc<AggregatedMetrics>>,
    labels: &EntityLabels,
) -> Vec<ComparisonRow> {
    let columns = column_keys(selection, data, labels);

    let mut series: Vec<(&str, HashMap<NaiveDate, u32>)> = Vec::with_capacity(columns.len());
    let mut dates = BTreeSet::new();
    for (id, key) in &columns {
        let Some(metrics) = data.get(id) else { continue };
        let counts: HashMap<NaiveDate, u32> = metrics
            .views_by_date
            .iter()
            .map(|bucket| (bucket.date, bucket.count))
            .collect();
        dates.extend(counts.keys().copied());
        series.push((key.as_str(), counts));
    }

    dates
        .into_iter()
        .map(|date| ComparisonRow {
            date,
            metric_by_entity: series
                .iter()
                .map(|(key, counts)| ((*key).to_string(), counts.get(&date).copied().unwrap_or(0)))
                .collect(),
        })
        .collect()
}
