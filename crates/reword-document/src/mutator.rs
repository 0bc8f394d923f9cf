use chrono::Utc;
use tracing::debug;

use reword_core::errors::TransformError;
use reword_core::ids::MarkerId;
use reword_core::policy::Mode;

use crate::document::{Anchor, Document, Span};
use crate::marker::{Marker, MarkerRegistry};

/// Applies rewritten text to the document as addressable, revertible
/// marker nodes, and owns the registry mapping marker ids to them.
///
/// Marker lifecycle: absent --apply--> applied --undo--> absent; an
/// applied marker whose node the host removes out-of-band becomes an
/// orphan and is pruned on the next housekeeping pass.
pub struct DocumentMutator {
    document: Document,
    registry: MarkerRegistry,
}

impl DocumentMutator {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            registry: MarkerRegistry::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Host-side access for out-of-band mutations.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn markers(&self) -> &MarkerRegistry {
        &self.registry
    }

    /// Substitute `transformed` for the first live occurrence of
    /// `original`, preferring the anchor captured at selection time.
    /// Returns `NotFound` without mutating anything when the original
    /// text no longer exists outside marker nodes.
    pub fn apply(
        &mut self,
        original: &str,
        transformed: &str,
        mode: Mode,
        anchor: Option<&Anchor>,
    ) -> Result<Marker, TransformError> {
        let needle = original.trim();
        if needle.is_empty() {
            return Err(TransformError::NotFound);
        }

        let location = anchor
            .and_then(|a| self.locate_via_anchor(a, needle))
            .or_else(|| self.document.find_in_text_spans(needle));
        let Some((span_index, start)) = location else {
            return Err(TransformError::NotFound);
        };
        let end = start + needle.len();

        let marker = Marker {
            id: MarkerId::new(),
            original_text: needle.to_string(),
            transformed_text: transformed.to_string(),
            mode,
            anchor: anchor.cloned(),
            created_at: Utc::now(),
        };

        self.document.wrap_in_marker(
            span_index,
            start,
            end,
            Span::Marker {
                id: marker.id.clone(),
                text: transformed.to_string(),
                original: needle.to_string(),
            },
        );
        self.registry.insert(marker.clone());
        debug!(marker_id = %marker.id, mode = mode.as_str(), "applied transformation");
        Ok(marker)
    }

    /// Restore one marker's original text. Idempotent: an absent or
    /// already-undone id returns `false` and leaves the document alone.
    pub fn undo(&mut self, id: &MarkerId) -> bool {
        let Some(span_index) = self.document.marker_position(id) else {
            // Node gone out-of-band; drop the stale registry entry.
            self.registry.remove(id);
            return false;
        };
        let Some(marker) = self.registry.remove(id) else {
            return false;
        };
        self.document
            .replace_with_text(span_index, marker.original_text);
        debug!(marker_id = %id, "restored original text");
        true
    }

    /// Undo every registered marker (snapshot semantics) and sweep marker
    /// nodes the registry no longer knows about. Returns the combined
    /// restore count.
    pub fn undo_all(&mut self) -> usize {
        let mut restored = 0;
        for id in self.registry.ids() {
            if self.undo(&id) {
                restored += 1;
            }
        }
        restored + self.sweep_orphans()
    }

    /// Restore marker spans that have no registry entry.
    fn sweep_orphans(&mut self) -> usize {
        let mut swept = 0;
        loop {
            let orphan = self.document.spans().iter().enumerate().find_map(|(i, s)| {
                match s {
                    Span::Marker { id, original, .. } if !self.registry.contains(id) => {
                        Some((i, original.clone()))
                    }
                    _ => None,
                }
            });
            let Some((index, original)) = orphan else {
                break;
            };
            self.document.replace_with_text(index, original);
            swept += 1;
        }
        if swept > 0 {
            debug!(count = swept, "swept orphaned marker nodes");
        }
        swept
    }

    /// Drop registry entries whose node the host removed out-of-band.
    pub fn prune(&mut self) -> usize {
        let mut pruned = 0;
        for id in self.registry.ids() {
            if self.document.marker_position(&id).is_none() {
                self.registry.remove(&id);
                pruned += 1;
            }
        }
        pruned
    }

    /// Anchor fast path: valid only if the anchored span is still plain
    /// text and still contains the original. Returns the absolute byte
    /// offset of the match within that span.
    fn locate_via_anchor(&self, anchor: &Anchor, needle: &str) -> Option<(usize, usize)> {
        let Span::Text(text) = self.document.span(anchor.span_index)? else {
            return None;
        };
        if anchor.start > anchor.end
            || anchor.end > text.len()
            || !text.is_char_boundary(anchor.start)
            || !text.is_char_boundary(anchor.end)
        {
            return None;
        }
        let slice = &text[anchor.start..anchor.end];
        if slice.trim() != needle {
            return None;
        }
        slice
            .find(needle)
            .map(|pos| (anchor.span_index, anchor.start + pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mutator(text: &str) -> DocumentMutator {
        DocumentMutator::new(Document::from_text(text))
    }

    #[test]
    fn apply_wraps_and_registers() {
        let mut m = mutator("The mitochondria is the powerhouse of the cell.");
        let marker = m
            .apply(
                "mitochondria is the powerhouse",
                "mitochondria makes energy",
                Mode::Simplify,
                None,
            )
            .unwrap();

        assert_eq!(m.document().text(), "The mitochondria makes energy of the cell.");
        assert!(m.markers().contains(&marker.id));
        assert_eq!(m.document().marker_position(&marker.id), Some(1));
    }

    #[test]
    fn apply_then_undo_round_trips() {
        let before = "Alpha beta gamma delta.";
        let mut m = mutator(before);
        let marker = m.apply("beta gamma", "SHORT", Mode::Summarize, None).unwrap();
        assert_ne!(m.document().text(), before);

        assert!(m.undo(&marker.id));
        assert_eq!(m.document().text(), before);
        assert!(m.markers().is_empty());
        assert_eq!(m.document().spans().len(), 1);
    }

    #[test]
    fn undo_is_idempotent() {
        let mut m = mutator("Some text to rewrite here.");
        let marker = m.apply("text to rewrite", "X", Mode::Simplify, None).unwrap();

        assert!(m.undo(&marker.id));
        let after_first = m.document().text();
        assert!(!m.undo(&marker.id));
        assert_eq!(m.document().text(), after_first);
    }

    #[test]
    fn undo_absent_id_returns_false() {
        let mut m = mutator("anything");
        assert!(!m.undo(&MarkerId::new()));
    }

    #[test]
    fn apply_missing_text_is_not_found_and_mutates_nothing() {
        let mut m = mutator("The quick brown fox.");
        let before = m.document().text();

        let err = m
            .apply("completely absent sentence", "X", Mode::Simplify, None)
            .unwrap_err();
        assert!(matches!(err, TransformError::NotFound));
        assert_eq!(m.document().text(), before);
        assert!(m.markers().is_empty());
    }

    #[test]
    fn search_skips_already_transformed_spans() {
        let mut m = mutator("unique phrase appears once");
        m.apply("unique phrase", "done", Mode::Simplify, None).unwrap();

        // The original now lives only inside a marker node.
        let err = m.apply("unique phrase", "again", Mode::Simplify, None).unwrap_err();
        assert!(matches!(err, TransformError::NotFound));
        assert_eq!(m.markers().len(), 1);
    }

    #[test]
    fn valid_anchor_beats_first_match() {
        let mut m = mutator("repeat target, then repeat target again");
        // Anchor the second occurrence: "repeat target" at byte 20.
        let anchor = Anchor {
            span_index: 0,
            start: 20,
            end: 33,
        };
        m.apply("repeat target", "X", Mode::Simplify, Some(&anchor)).unwrap();
        assert_eq!(m.document().text(), "repeat target, then X again");
    }

    #[test]
    fn stale_anchor_falls_back_to_search() {
        let mut m = mutator("prefix interesting part suffix");
        let anchor = Anchor {
            span_index: 0,
            start: 0,
            end: 6, // "prefix", no longer matching the original below
        };
        let marker = m
            .apply("interesting part", "IP", Mode::Clarify, Some(&anchor))
            .unwrap();
        assert_eq!(m.document().text(), "prefix IP suffix");
        assert!(m.markers().contains(&marker.id));
    }

    #[test]
    fn undo_all_restores_everything_in_one_pass() {
        let before = "First sentence. Second sentence. Third sentence.";
        let mut m = mutator(before);
        m.apply("First sentence.", "1.", Mode::Summarize, None).unwrap();
        m.apply("Second sentence.", "2.", Mode::Summarize, None).unwrap();
        m.apply("Third sentence.", "3.", Mode::Summarize, None).unwrap();
        assert_eq!(m.document().text(), "1. 2. 3.");

        assert_eq!(m.undo_all(), 3);
        assert_eq!(m.document().text(), before);
        assert!(m.markers().is_empty());
    }

    #[test]
    fn undo_all_sweeps_orphaned_marker_nodes() {
        // A document that already carries marker spans the registry has
        // never seen, e.g. after pipeline state was rebuilt.
        let mut doc = Document::from_text("keep this text intact");
        doc.wrap_in_marker(
            0,
            5,
            9,
            Span::Marker {
                id: MarkerId::new(),
                text: "THAT".to_string(),
                original: "this".to_string(),
            },
        );
        let mut m = DocumentMutator::new(doc);
        assert_eq!(m.document().text(), "keep THAT text intact");

        assert_eq!(m.undo_all(), 1);
        assert_eq!(m.document().text(), "keep this text intact");
    }

    #[test]
    fn external_removal_prunes_on_undo() {
        let mut m = mutator("some removable content here");
        let marker = m.apply("removable content", "RC", Mode::Simplify, None).unwrap();

        assert!(m.document_mut().external_remove(&marker.id));
        assert!(!m.undo(&marker.id));
        assert!(m.markers().is_empty());
    }

    #[test]
    fn prune_drops_stale_registry_entries() {
        let mut m = mutator("one target and another target two");
        let a = m.apply("one target", "A", Mode::Simplify, None).unwrap();
        let b = m.apply("another target", "B", Mode::Simplify, None).unwrap();

        m.document_mut().external_remove(&a.id);
        assert_eq!(m.prune(), 1);
        assert!(!m.markers().contains(&a.id));
        assert!(m.markers().contains(&b.id));
    }

    #[test]
    fn each_marker_maps_to_exactly_one_span() {
        let mut m = mutator("alpha one, alpha two, alpha three");
        let first = m.apply("alpha", "A", Mode::Simplify, None).unwrap();
        let second = m.apply("alpha", "B", Mode::Simplify, None).unwrap();

        assert_ne!(first.id, second.id);
        let ids = m.document().marker_ids();
        assert_eq!(ids.len(), 2);
        assert_eq!(m.document().text(), "A one, B two, alpha three");
    }
}
