//! Bounded, ordered selection set for comparison mode.

use serde::Serialize;
use tally_common::EntityId;

/// Result of toggling an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleOutcome {
    /// The id was absent and has been added.
    Added,
    /// The id was present and has been removed.
    Removed,
    /// The id was absent but the set is full; nothing changed.
    AtCapacity,
}

impl ToggleOutcome {
    /// Whether the selection changed.
    #[must_use]
    pub const fn changed(self) -> bool {
        !matches!(self, Self::AtCapacity)
    }
}

/// Ordered set of at most `capacity` entity ids, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    ids: Vec<EntityId>,
    #[serde(skip)]
    capacity: usize,
}

impl Selection {
    /// Creates an empty selection holding at most `capacity` ids.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            ids: Vec::new(),
            capacity,
        }
    }

    /// Removes `id` if present, otherwise adds it when there is room.
    pub fn toggle(&mut self, id: EntityId) -> ToggleOutcome {
        if let Some(pos) = self.ids.iter().position(|existing| *existing == id) {
            self.ids.remove(pos);
            ToggleOutcome::Removed
        } else if self.is_full() {
            ToggleOutcome::AtCapacity
        } else {
            self.ids.push(id);
            ToggleOutcome::Added
        }
    }

    /// Whether `id` is selected.
    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.ids.contains(id)
    }

    /// Selected ids in insertion order.
    #[must_use]
    pub fn as_slice(&self) -> &[EntityId] {
        &self.ids
    }

    /// Iterates selected ids in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityId> {
        self.ids.iter()
    }

    /// Number of selected ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Maximum number of ids.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether no id can be added.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.ids.len() >= self.capacity
    }

    /// Empties the selection. Returns whether anything was removed.
    pub fn clear(&mut self) -> bool {
        let changed = !self.ids.is_empty();
        self.ids.clear();
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_selection() -> Selection {
        let mut selection = Selection::new(4);
        for id in ["P1", "P2", "P3", "P4"] {
            assert_eq!(selection.toggle(EntityId::from(id)), ToggleOutcome::Added);
        }
        selection
    }

    #[test]
    fn test_toggle_fifth_id_is_noop() {
        let mut selection = full_selection();
        let before = selection.clone();

        assert_eq!(selection.toggle(EntityId::from("P5")), ToggleOutcome::AtCapacity);
        assert_eq!(selection, before);
        assert_eq!(selection.len(), 4);
    }

    #[test]
    fn test_toggle_removes_present_id_even_when_full() {
        let mut selection = full_selection();

        assert_eq!(selection.toggle(EntityId::from("P2")), ToggleOutcome::Removed);
        assert_eq!(
            selection.as_slice(),
            &[EntityId::from("P1"), EntityId::from("P3"), EntityId::from("P4")]
        );

        assert_eq!(selection.toggle(EntityId::from("P5")), ToggleOutcome::Added);
        assert!(selection.contains(&EntityId::from("P5")));
        assert!(selection.is_full());
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let mut selection = Selection::new(4);
        selection.toggle(EntityId::from("B"));
        selection.toggle(EntityId::from("A"));
        let ids: Vec<&str> = selection.iter().map(EntityId::as_str).collect();
        assert_eq!(ids, vec!["B", "A"]);
    }

    #[test]
    fn test_clear() {
        let mut selection = full_selection();
        assert!(selection.clear());
        assert!(selection.is_empty());
        assert!(!selection.clear());
    }

    #[test]
    fn test_outcome_changed() {
        assert!(ToggleOutcome::Added.changed());
        assert!(ToggleOutcome::Removed.changed());
        assert!(!ToggleOutcome::AtCapacity.changed());
    }
}
