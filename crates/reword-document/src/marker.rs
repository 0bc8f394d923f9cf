use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reword_core::ids::MarkerId;
use reword_core::policy::Mode;

use crate::document::Anchor;

/// The live record bridging document state and one applied
/// transformation. Owned exclusively by the registry from apply until
/// undo (or orphan pruning).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Marker {
    pub id: MarkerId,
    pub original_text: String,
    pub transformed_text: String,
    pub mode: Mode,
    pub anchor: Option<Anchor>,
    pub created_at: DateTime<Utc>,
}

/// In-memory registry of applied markers, scoped to one document
/// lifetime. The sole shared mutable state of the pipeline.
#[derive(Debug, Default)]
pub struct MarkerRegistry {
    entries: HashMap<MarkerId, Marker>,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, marker: Marker) {
        self.entries.insert(marker.id.clone(), marker);
    }

    pub fn remove(&mut self, id: &MarkerId) -> Option<Marker> {
        self.entries.remove(id)
    }

    pub fn get(&self, id: &MarkerId) -> Option<&Marker> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &MarkerId) -> bool {
        self.entries.contains_key(id)
    }

    /// Snapshot of the current ids. Entries added after the snapshot are
    /// not included.
    pub fn ids(&self) -> Vec<MarkerId> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(original: &str) -> Marker {
        Marker {
            id: MarkerId::new(),
            original_text: original.to_string(),
            transformed_text: "rewritten".to_string(),
            mode: Mode::Simplify,
            anchor: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn insert_get_remove() {
        let mut registry = MarkerRegistry::new();
        let m = marker("original");
        let id = m.id.clone();

        registry.insert(m);
        assert!(registry.contains(&id));
        assert_eq!(registry.get(&id).unwrap().original_text, "original");

        let removed = registry.remove(&id).unwrap();
        assert_eq!(removed.id, id);
        assert!(registry.remove(&id).is_none());
    }

    #[test]
    fn ids_snapshot_is_detached() {
        let mut registry = MarkerRegistry::new();
        registry.insert(marker("a"));
        let snapshot = registry.ids();
        registry.insert(marker("b"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn marker_serde_roundtrip() {
        let m = marker("text");
        let json = serde_json::to_string(&m).unwrap();
        let parsed: Marker = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, m.id);
        assert_eq!(parsed.mode, Mode::Simplify);
    }
}
