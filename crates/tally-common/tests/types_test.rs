//! Tests for the event model in tally-common.
//!
//! This test suite covers:
//! - Newtype identifiers implementing expected traits (Display, Debug, Serialize, Deserialize)
//! - Event type wire names, including extensible types
//! - Events decoding from the shape the event store produces

use std::collections::{BTreeMap, HashMap};
use tally_common::types::*;

mod newtype_trait_tests {
    use super::*;

    #[test]
    fn test_entity_id_implements_expected_traits() {
        let entity_id = EntityId::from("profile-42");

        // Test Debug
        let debug_str = format!("{:?}", entity_id);
        assert_eq!(debug_str, "EntityId(\"profile-42\")");

        // Test Display
        assert_eq!(entity_id.to_string(), "profile-42");

        // Test Hash - can be used in HashMap
        let mut map = HashMap::new();
        map.insert(entity_id.clone(), "Acme");
        assert_eq!(map.get(&entity_id), Some(&"Acme"));

        // Test Ord - sorts by raw id
        let mut ids = vec![EntityId::from("b"), EntityId::from("a")];
        ids.sort();
        assert_eq!(ids, vec![EntityId::from("a"), EntityId::from("b")]);
    }

    #[test]
    fn test_entity_id_serializes_transparently() {
        let entity_id = EntityId::new("P1");

        let serialized = serde_json::to_string(&entity_id).unwrap();
        assert_eq!(serialized, "\"P1\"");

        let deserialized: EntityId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, entity_id);
    }

    #[test]
    fn test_event_id_serializes_transparently() {
        let event_id = EventId::new("evt-1");
        assert_eq!(serde_json::to_string(&event_id).unwrap(), "\"evt-1\"");
        assert_eq!(event_id.to_string(), "evt-1");
    }
}

mod event_type_tests {
    use super::*;

    #[test]
    fn test_known_types_use_snake_case_wire_names() {
        let cases = [
            (EventType::View, "\"view\""),
            (EventType::Share, "\"share\""),
            (EventType::ContactClick, "\"contact_click\""),
            (EventType::ServiceView, "\"service_view\""),
        ];

        for (event_type, wire) in cases {
            assert_eq!(serde_json::to_string(&event_type).unwrap(), wire);
            let parsed: EventType = serde_json::from_str(wire).unwrap();
            assert_eq!(parsed, event_type);
        }
    }

    #[test]
    fn test_unknown_types_are_preserved() {
        let parsed: EventType = serde_json::from_str("\"gallery_open\"").unwrap();
        assert_eq!(parsed, EventType::Other("gallery_open".to_string()));
        assert_eq!(parsed.to_string(), "gallery_open");
    }

    #[test]
    fn test_event_types_work_as_map_keys() {
        let mut totals = BTreeMap::new();
        totals.insert(EventType::Share, 2u64);
        totals.insert(EventType::View, 5u64);

        let json = serde_json::to_string(&totals).unwrap();
        assert!(json.contains("\"view\":5"));
        assert!(json.contains("\"share\":2"));
    }
}

mod event_tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_event_with_metadata() {
        let json = r#"{
            "id": "e-9",
            "entity_id": "P1",
            "event_type": "contact_click",
            "occurred_at": "2024-03-14T23:59:59Z",
            "metadata": {"channel": "email", "position": 2}
        }"#;

        let event: Event = serde_json::from_str(json).unwrap();
        assert!(event.is(&EventType::ContactClick));
        assert_eq!(
            event.occurred_at,
            Utc.with_ymd_and_hms(2024, 3, 14, 23, 59, 59).unwrap()
        );

        let metadata = event.metadata.as_ref().unwrap();
        assert_eq!(metadata["channel"], serde_json::json!("email"));
        assert_eq!(metadata["position"], serde_json::json!(2));
    }

    #[test]
    fn test_event_builder() {
        let mut metadata = EventMetadata::new();
        metadata.insert("source".to_string(), serde_json::json!("qr"));

        let at = Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap();
        let event = Event::new("e-1", "P1", EventType::View, at).with_metadata(metadata.clone());

        assert_eq!(event.entity_id, EntityId::from("P1"));
        assert_eq!(event.metadata, Some(metadata));
        assert!(!event.is(&EventType::Share));
    }
}
