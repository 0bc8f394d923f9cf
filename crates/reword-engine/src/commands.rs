use serde::{Deserialize, Serialize};

use reword_core::ids::{BatchId, MarkerId};
use reword_core::policy::{GradeLevel, Mode, ModeSet};
use reword_document::Anchor;

use crate::pipeline::Pipeline;

/// Requests crossing the host boundary as tagged JSON. The host sends
/// one of these; lifecycle events flow back separately via
/// [`Pipeline::subscribe`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Transform {
        text: String,
        modes: Vec<Mode>,
        grade: GradeLevel,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        anchor: Option<Anchor>,
    },
    Undo {
        marker_id: MarkerId,
    },
    UndoAll,
}

/// Direct reply to one command.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum CommandReply {
    Transformed {
        batch_id: BatchId,
        applied: Vec<MarkerId>,
        failed: usize,
        superseded: bool,
        summary: String,
    },
    Undone {
        restored: bool,
    },
    AllUndone {
        restored: usize,
    },
    Failed {
        kind: String,
        message: String,
    },
}

/// Dispatch one host command against the pipeline. Batch-level failures
/// become a `Failed` reply; per-chunk failures stay inside `Transformed`.
pub async fn handle_command(pipeline: &Pipeline, command: Command) -> CommandReply {
    match command {
        Command::Transform {
            text,
            modes,
            grade,
            anchor,
        } => {
            let set: ModeSet = modes.into_iter().collect();
            match pipeline.transform_selection(&text, set, grade, anchor).await {
                Ok(summary) => CommandReply::Transformed {
                    batch_id: summary.batch_id,
                    failed: summary.outcome.failed(),
                    applied: summary.applied,
                    superseded: summary.superseded,
                    summary: summary.summary,
                },
                Err(error) => CommandReply::Failed {
                    kind: error.error_kind().into(),
                    message: error.to_string(),
                },
            }
        }
        Command::Undo { marker_id } => CommandReply::Undone {
            restored: pipeline.undo(&marker_id),
        },
        Command::UndoAll => CommandReply::AllUndone {
            restored: pipeline.undo_all(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use reword_client::{ClientConfig, MemoryCredentialStore, MockReply, MockTransport, TransformClient};
    use reword_core::credentials::Credentials;
    use reword_document::Document;

    use crate::pipeline::PipelineConfig;

    fn pipeline(replies: Vec<MockReply>, document: &str) -> Pipeline {
        let client = TransformClient::new(
            Arc::new(MockTransport::new(replies)),
            ClientConfig::default(),
        );
        Pipeline::new(
            client,
            Document::from_text(document),
            Arc::new(MemoryCredentialStore::with(Credentials::new(
                "test-key",
                "rewrite-small",
            ))),
            PipelineConfig::default(),
        )
    }

    #[test]
    fn commands_parse_from_tagged_json() {
        let json = r#"{
            "command": "transform",
            "text": "Some dense prose.",
            "modes": ["simplify", "summarize"],
            "grade": "middle_school",
            "anchor": { "span_index": 0, "start": 4, "end": 15 }
        }"#;
        let command: Command = serde_json::from_str(json).unwrap();
        match command {
            Command::Transform {
                text,
                modes,
                grade,
                anchor,
            } => {
                assert_eq!(text, "Some dense prose.");
                assert_eq!(modes, vec![Mode::Simplify, Mode::Summarize]);
                assert_eq!(grade, GradeLevel::MiddleSchool);
                assert_eq!(anchor.unwrap().start, 4);
            }
            other => panic!("wrong variant: {other:?}"),
        }

        let undo_all: Command = serde_json::from_str(r#"{"command":"undo_all"}"#).unwrap();
        assert!(matches!(undo_all, Command::UndoAll));
    }

    #[test]
    fn anchor_is_optional_in_transform() {
        let json = r#"{"command":"transform","text":"t","modes":["clarify"],"grade":"expert"}"#;
        let command: Command = serde_json::from_str(json).unwrap();
        assert!(matches!(command, Command::Transform { anchor: None, .. }));
    }

    #[tokio::test]
    async fn transform_command_round_trips_through_the_pipeline() {
        let text = "The mitochondria is the powerhouse of the cell.";
        let p = pipeline(vec![MockReply::text("Mitochondria make energy.")], text);

        let reply = handle_command(
            &p,
            Command::Transform {
                text: text.into(),
                modes: vec![Mode::Simplify],
                grade: GradeLevel::Elementary,
                anchor: None,
            },
        )
        .await;

        let CommandReply::Transformed {
            applied,
            failed,
            superseded,
            ..
        } = reply
        else {
            panic!("expected Transformed, got {reply:?}");
        };
        assert_eq!(applied.len(), 1);
        assert_eq!(failed, 0);
        assert!(!superseded);
        assert_eq!(p.document_text(), "Mitochondria make energy.");
    }

    #[tokio::test]
    async fn undo_command_reports_whether_anything_was_restored() {
        let text = "Original sentence to rewrite.";
        let p = pipeline(vec![MockReply::text("Short.")], text);

        let reply = handle_command(
            &p,
            Command::Transform {
                text: text.into(),
                modes: vec![Mode::Summarize],
                grade: GradeLevel::College,
                anchor: None,
            },
        )
        .await;
        let CommandReply::Transformed { applied, .. } = reply else {
            panic!("expected Transformed");
        };

        let reply = handle_command(
            &p,
            Command::Undo {
                marker_id: applied[0].clone(),
            },
        )
        .await;
        assert!(matches!(reply, CommandReply::Undone { restored: true }));
        assert_eq!(p.document_text(), text);

        // Unknown id after restore.
        let reply = handle_command(&p, Command::Undo { marker_id: MarkerId::new() }).await;
        assert!(matches!(reply, CommandReply::Undone { restored: false }));
    }

    #[tokio::test]
    async fn missing_credentials_surface_as_a_failed_reply() {
        let client = TransformClient::new(
            Arc::new(MockTransport::new(vec![])),
            ClientConfig::default(),
        );
        let p = Pipeline::new(
            client,
            Document::from_text("text"),
            Arc::new(MemoryCredentialStore::new()),
            PipelineConfig::default(),
        );

        let reply = handle_command(
            &p,
            Command::Transform {
                text: "text".into(),
                modes: vec![Mode::Simplify],
                grade: GradeLevel::HighSchool,
                anchor: None,
            },
        )
        .await;
        let CommandReply::Failed { kind, .. } = reply else {
            panic!("expected Failed, got {reply:?}");
        };
        assert_eq!(kind, "auth");
    }

    #[test]
    fn replies_serialize_with_their_tag() {
        let reply = CommandReply::AllUndone { restored: 3 };
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["reply"], "all_undone");
        assert_eq!(json["restored"], 3);
    }
}
