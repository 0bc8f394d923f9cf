use serde::{Deserialize, Serialize};

use reword_core::chunk::normalize;
use reword_core::ids::MarkerId;

/// A reference into the live document identifying where the original text
/// sat at selection time. Offsets are byte positions into one span's text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub span_index: usize,
    pub start: usize,
    pub end: usize,
}

/// One node of the document model: plain text, or an addressable marker
/// node tagged with its id and the original text it replaced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Span {
    Text(String),
    Marker {
        id: MarkerId,
        text: String,
        original: String,
    },
}

impl Span {
    /// The text this span currently contributes to the document.
    pub fn visible_text(&self) -> &str {
        match self {
            Span::Text(t) => t,
            Span::Marker { text, .. } => text,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Span::Text(_))
    }

    pub fn marker_id(&self) -> Option<&MarkerId> {
        match self {
            Span::Marker { id, .. } => Some(id),
            Span::Text(_) => None,
        }
    }
}

/// Ordered-span document model standing in for the host page. Mutations
/// go through the mutator; the host may also remove marker nodes
/// out-of-band via [`Document::external_remove`].
#[derive(Clone, Debug, Default)]
pub struct Document {
    spans: Vec<Span>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from source text. Line endings and excess blank
    /// lines are normalized on the way in; segmentation produces chunk
    /// bodies from the same normalization, so applied rewrites always
    /// find their original text here.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = normalize(&text.into());
        let spans = if text.is_empty() {
            Vec::new()
        } else {
            vec![Span::Text(text)]
        };
        Self { spans }
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn span(&self, index: usize) -> Option<&Span> {
        self.spans.get(index)
    }

    /// Full visible text of the document.
    pub fn text(&self) -> String {
        self.spans.iter().map(Span::visible_text).collect()
    }

    /// First occurrence of `needle` inside a plain text span, skipping
    /// marker nodes. Returns (span index, byte offset).
    pub fn find_in_text_spans(&self, needle: &str) -> Option<(usize, usize)> {
        if needle.is_empty() {
            return None;
        }
        self.spans.iter().enumerate().find_map(|(i, span)| match span {
            Span::Text(t) => t.find(needle).map(|pos| (i, pos)),
            Span::Marker { .. } => None,
        })
    }

    /// Index of the marker span with the given id, if it is still present.
    pub fn marker_position(&self, id: &MarkerId) -> Option<usize> {
        self.spans
            .iter()
            .position(|s| s.marker_id() == Some(id))
    }

    /// Ids of all marker spans currently in the document.
    pub fn marker_ids(&self) -> Vec<MarkerId> {
        self.spans
            .iter()
            .filter_map(|s| s.marker_id().cloned())
            .collect()
    }

    /// Replace `[start, end)` of the text span at `span_index` with a
    /// marker span, keeping surrounding text in place. Empty sides are
    /// not emitted.
    pub(crate) fn wrap_in_marker(
        &mut self,
        span_index: usize,
        start: usize,
        end: usize,
        marker: Span,
    ) {
        debug_assert!(matches!(marker, Span::Marker { .. }));
        let Span::Text(text) = self.spans.remove(span_index) else {
            unreachable!("wrap_in_marker called on a marker span");
        };

        let mut insert_at = span_index;
        if start > 0 {
            self.spans
                .insert(insert_at, Span::Text(text[..start].to_string()));
            insert_at += 1;
        }
        self.spans.insert(insert_at, marker);
        insert_at += 1;
        if end < text.len() {
            self.spans
                .insert(insert_at, Span::Text(text[end..].to_string()));
        }
    }

    /// Replace the span at `span_index` with plain text and merge
    /// adjacent text spans back together.
    pub(crate) fn replace_with_text(&mut self, span_index: usize, text: String) {
        self.spans[span_index] = Span::Text(text);
        self.merge_adjacent_text();
    }

    /// Host-side out-of-band removal of a marker node. The registry entry
    /// becomes an orphan until the next housekeeping pass.
    pub fn external_remove(&mut self, id: &MarkerId) -> bool {
        match self.marker_position(id) {
            Some(index) => {
                self.spans.remove(index);
                self.merge_adjacent_text();
                true
            }
            None => false,
        }
    }

    fn merge_adjacent_text(&mut self) {
        let mut merged: Vec<Span> = Vec::with_capacity(self.spans.len());
        for span in self.spans.drain(..) {
            match (merged.last_mut(), span) {
                (Some(Span::Text(prev)), Span::Text(next)) => prev.push_str(&next),
                (_, span) => merged.push(span),
            }
        }
        self.spans = merged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(id: &MarkerId, text: &str, original: &str) -> Span {
        Span::Marker {
            id: id.clone(),
            text: text.to_string(),
            original: original.to_string(),
        }
    }

    #[test]
    fn from_text_and_text_roundtrip() {
        let doc = Document::from_text("hello world");
        assert_eq!(doc.text(), "hello world");
        assert_eq!(doc.spans().len(), 1);
        assert!(Document::from_text("").spans().is_empty());
    }

    #[test]
    fn from_text_normalizes_source() {
        let doc = Document::from_text("line one\r\nline two\n\n\n\nline three\r\n");
        assert_eq!(doc.text(), "line one\nline two\n\nline three");
        // Segmenter-produced needles match without any CRLF left behind.
        assert_eq!(doc.find_in_text_spans("line two\n\nline three"), Some((0, 9)));
    }

    #[test]
    fn find_skips_marker_spans() {
        let id = MarkerId::new();
        let mut doc = Document::from_text("alpha beta gamma");
        doc.wrap_in_marker(0, 6, 10, marker(&id, "REPLACED", "beta"));

        assert!(doc.find_in_text_spans("beta").is_none());
        assert!(doc.find_in_text_spans("REPLACED").is_none());
        assert_eq!(doc.find_in_text_spans("gamma"), Some((2, 1)));
    }

    #[test]
    fn wrap_splits_into_three_spans() {
        let id = MarkerId::new();
        let mut doc = Document::from_text("one two three");
        doc.wrap_in_marker(0, 4, 7, marker(&id, "2", "two"));

        assert_eq!(doc.spans().len(), 3);
        assert_eq!(doc.text(), "one 2 three");
        assert_eq!(doc.marker_position(&id), Some(1));
    }

    #[test]
    fn wrap_at_edges_omits_empty_sides() {
        let id = MarkerId::new();
        let mut doc = Document::from_text("edge");
        doc.wrap_in_marker(0, 0, 4, marker(&id, "EDGE", "edge"));
        assert_eq!(doc.spans().len(), 1);
        assert_eq!(doc.text(), "EDGE");
    }

    #[test]
    fn replace_with_text_merges_neighbors() {
        let id = MarkerId::new();
        let mut doc = Document::from_text("one two three");
        doc.wrap_in_marker(0, 4, 7, marker(&id, "2", "two"));
        doc.replace_with_text(1, "two".to_string());

        assert_eq!(doc.spans().len(), 1);
        assert_eq!(doc.text(), "one two three");
    }

    #[test]
    fn external_remove_drops_span_and_content() {
        let id = MarkerId::new();
        let mut doc = Document::from_text("one two three");
        doc.wrap_in_marker(0, 4, 7, marker(&id, "2", "two"));

        assert!(doc.external_remove(&id));
        assert_eq!(doc.text(), "one  three");
        assert!(!doc.external_remove(&id));
    }
}
