use serde::{Deserialize, Serialize};

use crate::ids::{BatchId, MarkerId};
use crate::policy::{GradeLevel, Mode};

/// Pipeline lifecycle events emitted while a batch runs. The presentation
/// layer drives its loading and error states from these.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    #[serde(rename = "batch_start")]
    BatchStart {
        batch_id: BatchId,
        chunk_count: usize,
        modes: Vec<Mode>,
        grade: GradeLevel,
    },

    #[serde(rename = "chunk_rewritten")]
    ChunkRewritten {
        batch_id: BatchId,
        chunk_index: usize,
        marker_id: Option<MarkerId>,
    },

    #[serde(rename = "chunk_failed")]
    ChunkFailed {
        batch_id: BatchId,
        chunk_index: usize,
        error_kind: String,
        retryable: bool,
    },

    #[serde(rename = "batch_complete")]
    BatchComplete {
        batch_id: BatchId,
        applied: usize,
        failed: usize,
        summary: String,
    },

    #[serde(rename = "batch_superseded")]
    BatchSuperseded { batch_id: BatchId },
}

impl PipelineEvent {
    pub fn batch_id(&self) -> &BatchId {
        match self {
            Self::BatchStart { batch_id, .. }
            | Self::ChunkRewritten { batch_id, .. }
            | Self::ChunkFailed { batch_id, .. }
            | Self::BatchComplete { batch_id, .. }
            | Self::BatchSuperseded { batch_id } => batch_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::BatchStart { .. } => "batch_start",
            Self::ChunkRewritten { .. } => "chunk_rewritten",
            Self::ChunkFailed { .. } => "chunk_failed",
            Self::BatchComplete { .. } => "batch_complete",
            Self::BatchSuperseded { .. } => "batch_superseded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_tags_match_event_type() {
        let events = vec![
            PipelineEvent::BatchStart {
                batch_id: BatchId::new(),
                chunk_count: 3,
                modes: vec![Mode::Simplify],
                grade: GradeLevel::MiddleSchool,
            },
            PipelineEvent::ChunkFailed {
                batch_id: BatchId::new(),
                chunk_index: 1,
                error_kind: "rate_limited".into(),
                retryable: true,
            },
            PipelineEvent::BatchSuperseded {
                batch_id: BatchId::new(),
            },
        ];
        for event in &events {
            let json = serde_json::to_value(event).unwrap();
            assert_eq!(json["type"], event.event_type());
        }
    }

    #[test]
    fn batch_id_accessor() {
        let id = BatchId::new();
        let event = PipelineEvent::BatchComplete {
            batch_id: id.clone(),
            applied: 3,
            failed: 1,
            summary: "3 of 4 sections rewritten".into(),
        };
        assert_eq!(event.batch_id(), &id);
    }

    #[test]
    fn roundtrips_through_json() {
        let event = PipelineEvent::ChunkRewritten {
            batch_id: BatchId::new(),
            chunk_index: 2,
            marker_id: Some(MarkerId::new()),
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: PipelineEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.event_type(), "chunk_rewritten");
        assert_eq!(parsed.batch_id(), event.batch_id());
    }
}
