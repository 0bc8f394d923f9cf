use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use reword_client::{TransformClient, TransformOutcome, TransformResult};
use reword_core::chunk::{segment, Chunk};
use reword_core::credentials::CredentialStore;
use reword_core::errors::TransformError;
use reword_core::events::PipelineEvent;
use reword_core::ids::{BatchId, MarkerId};
use reword_core::policy::{compile, GradeLevel, Mode, ModeSet};
use reword_document::{Anchor, Document, DocumentMutator};

/// Tuning for segmentation and event delivery.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Character ceiling per chunk handed to the client.
    pub max_chunk_size: usize,
    /// Characters of preceding context prepended to each chunk after
    /// the first.
    pub overlap: usize,
    /// Broadcast buffer for lifecycle events.
    pub event_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 3_000,
            overlap: 0,
            event_capacity: 256,
        }
    }
}

/// What one `transform_selection` call produced.
#[derive(Debug)]
pub struct TransformSummary {
    pub batch_id: BatchId,
    /// Markers applied to the document, in chunk order.
    pub applied: Vec<MarkerId>,
    /// Per-chunk results, including failures that were never applied.
    pub outcome: TransformOutcome,
    /// One line for the presentation layer, wording partial success.
    pub summary: String,
    /// True when a newer batch started before this one finished; its
    /// remaining results were discarded.
    pub superseded: bool,
}

/// Orchestrates one selection through segment, compile, transform, and
/// apply, emitting lifecycle events along the way.
///
/// Batches are serialized per document by a generation counter: starting
/// a new batch cancels the previous one, and results from a superseded
/// batch are never applied.
pub struct Pipeline {
    client: TransformClient,
    mutator: Mutex<DocumentMutator>,
    credentials: Arc<dyn CredentialStore>,
    events: broadcast::Sender<PipelineEvent>,
    generation: AtomicU64,
    active: Mutex<Option<CancellationToken>>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        client: TransformClient,
        document: Document,
        credentials: Arc<dyn CredentialStore>,
        config: PipelineConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            client,
            mutator: Mutex::new(DocumentMutator::new(document)),
            credentials,
            events,
            generation: AtomicU64::new(0),
            active: Mutex::new(None),
            config,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Current visible text of the document.
    pub fn document_text(&self) -> String {
        self.mutator.lock().document().text()
    }

    pub fn marker_count(&self) -> usize {
        self.mutator.lock().markers().len()
    }

    /// Run the full pipeline over one selection. Returns `Err` only for
    /// failures that prevent the batch from starting; per-chunk failures
    /// are reported inside the summary.
    pub async fn transform_selection(
        &self,
        text: &str,
        modes: ModeSet,
        grade: GradeLevel,
        anchor: Option<Anchor>,
    ) -> Result<TransformSummary, TransformError> {
        let credentials = self
            .credentials
            .load()
            .await?
            .ok_or_else(|| TransformError::Auth("no credentials configured".into()))?;

        let batch_id = BatchId::new();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        if let Some(previous) = self.active.lock().replace(token.clone()) {
            previous.cancel();
        }

        let chunks = segment(text, self.config.max_chunk_size, self.config.overlap);
        if chunks.is_empty() {
            debug!(batch_id = %batch_id, "empty selection, nothing to rewrite");
            return Ok(TransformSummary {
                batch_id,
                applied: Vec::new(),
                outcome: TransformOutcome::default(),
                summary: "nothing to rewrite".into(),
                superseded: false,
            });
        }

        let modes = if modes.is_empty() {
            [Mode::Simplify].into_iter().collect()
        } else {
            modes
        };
        let mode = modes.primary().unwrap_or(Mode::Simplify);
        let bundle = compile(&modes, grade);
        let anchors = chunk_anchors(anchor.as_ref(), &chunks);

        self.emit(PipelineEvent::BatchStart {
            batch_id: batch_id.clone(),
            chunk_count: chunks.len(),
            modes: modes.iter().collect(),
            grade,
        });
        info!(
            batch_id = %batch_id,
            chunks = chunks.len(),
            mode = mode.as_str(),
            grade = grade.as_str(),
            "batch started"
        );

        let mut stream =
            Box::pin(self.client.transform_stream(chunks.clone(), &bundle, &credentials));
        let mut results: Vec<TransformResult> = Vec::new();
        let mut applied: Vec<MarkerId> = Vec::new();
        let mut superseded = false;

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    superseded = true;
                    break;
                }
                next = stream.next() => next,
            };
            let Some(mut result) = next else { break };
            if self.generation.load(Ordering::SeqCst) != generation {
                superseded = true;
                break;
            }

            let index = result.chunk_index;
            if let Ok(output) = &result.output {
                let applied_marker = self.mutator.lock().apply(
                    chunks[index].body(),
                    output,
                    mode,
                    anchors[index].as_ref(),
                );
                match applied_marker {
                    Ok(marker) => {
                        applied.push(marker.id.clone());
                        self.emit(PipelineEvent::ChunkRewritten {
                            batch_id: batch_id.clone(),
                            chunk_index: index,
                            marker_id: Some(marker.id),
                        });
                    }
                    Err(error) => {
                        // Selection drifted out from under us.
                        result.output = Err(error);
                    }
                }
            }
            if let Err(error) = &result.output {
                warn!(
                    batch_id = %batch_id,
                    chunk_index = index,
                    error = %error,
                    kind = error.error_kind(),
                    "chunk not applied"
                );
                self.emit(PipelineEvent::ChunkFailed {
                    batch_id: batch_id.clone(),
                    chunk_index: index,
                    error_kind: error.error_kind().into(),
                    retryable: error.is_retryable(),
                });
            }
            results.push(result);
        }
        drop(stream);

        let outcome = TransformOutcome { results };
        if superseded {
            self.emit(PipelineEvent::BatchSuperseded {
                batch_id: batch_id.clone(),
            });
            info!(batch_id = %batch_id, "batch superseded by a newer request");
            return Ok(TransformSummary {
                batch_id,
                applied,
                outcome,
                summary: "superseded by a newer request".into(),
                superseded: true,
            });
        }

        let summary = summarize(chunks.len(), &outcome);
        self.emit(PipelineEvent::BatchComplete {
            batch_id: batch_id.clone(),
            applied: applied.len(),
            failed: outcome.failed(),
            summary: summary.clone(),
        });
        info!(
            batch_id = %batch_id,
            applied = applied.len(),
            failed = outcome.failed(),
            "batch complete"
        );

        Ok(TransformSummary {
            batch_id,
            applied,
            outcome,
            summary,
            superseded: false,
        })
    }

    /// Restore one marker's original text. Idempotent.
    pub fn undo(&self, id: &MarkerId) -> bool {
        self.mutator.lock().undo(id)
    }

    /// Restore every applied marker, orphans included.
    pub fn undo_all(&self) -> usize {
        self.mutator.lock().undo_all()
    }

    /// Drop registry entries whose node was removed out-of-band.
    pub fn prune(&self) -> usize {
        self.mutator.lock().prune()
    }

    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine; events are advisory.
        let _ = self.events.send(event);
    }
}

/// Derive per-chunk anchors from the selection anchor. Chunk bodies
/// concatenate to the normalized selection, so when the anchored range
/// has the same length the per-chunk offsets line up exactly. Otherwise
/// normalization shifted bytes and each chunk falls back to search.
fn chunk_anchors(anchor: Option<&Anchor>, chunks: &[Chunk]) -> Vec<Option<Anchor>> {
    let Some(anchor) = anchor else {
        return vec![None; chunks.len()];
    };
    if chunks.len() == 1 {
        return vec![Some(anchor.clone())];
    }
    let total: usize = chunks.iter().map(|c| c.body().len()).sum();
    if anchor.end.saturating_sub(anchor.start) != total {
        return vec![None; chunks.len()];
    }
    let mut offset = anchor.start;
    chunks
        .iter()
        .map(|chunk| {
            let start = offset;
            offset += chunk.body().len();
            Some(Anchor {
                span_index: anchor.span_index,
                start,
                end: offset,
            })
        })
        .collect()
}

fn summarize(total: usize, outcome: &TransformOutcome) -> String {
    let applied = outcome.succeeded();
    if outcome.failed() == 0 {
        return if total == 1 {
            "section rewritten".into()
        } else {
            format!("all {total} sections rewritten")
        };
    }

    let mut labels: Vec<&'static str> = Vec::new();
    let mut retryable = false;
    for (_, error) in outcome.failures() {
        let label = error.label();
        if !labels.contains(&label) {
            labels.push(label);
        }
        retryable |= error.is_retryable();
    }

    let mut line = format!(
        "{applied} of {total} sections rewritten; {} failed: {}",
        outcome.failed(),
        labels.join(", "),
    );
    if retryable {
        line.push_str(" (retry available)");
    }
    line
}
