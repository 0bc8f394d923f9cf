use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use reword_client::{
    ClientConfig, FileCredentialStore, HttpTransport, MemoryCredentialStore, TransformClient,
};
use reword_core::credentials::{CredentialStore, Credentials};
use reword_core::policy::{GradeLevel, Mode, ModeSet};
use reword_document::Document;
use reword_engine::{Pipeline, PipelineConfig};
use reword_telemetry::{init_telemetry, LogQuery, SqliteLogSink, TelemetryConfig};

#[derive(Parser)]
#[command(name = "reword", about = "Rewrite text at a chosen reading level")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store API credentials for the transformation service.
    Login {
        /// API key for the service.
        #[arg(long)]
        api_key: String,
        /// Model identifier to request.
        #[arg(long, default_value = "gpt-4o-mini")]
        model: String,
    },
    /// Rewrite text from a file (or stdin) and print the result.
    Run {
        /// Input file; reads stdin when omitted.
        input: Option<PathBuf>,
        /// Transformation modes, highest priority first.
        #[arg(long, value_parser = parse_mode, default_values = ["simplify"])]
        mode: Vec<Mode>,
        /// Target reading level.
        #[arg(long, value_parser = parse_grade, default_value = "middle_school")]
        grade: GradeLevel,
        /// Character ceiling per dispatched chunk.
        #[arg(long, default_value_t = 3000)]
        max_chunk_size: usize,
        /// Characters of preceding context carried into each chunk.
        #[arg(long, default_value_t = 0)]
        overlap: usize,
        /// Service endpoint.
        #[arg(long)]
        endpoint: Option<String>,
        /// Print lifecycle events to stderr as JSON lines.
        #[arg(long)]
        events: bool,
    },
    /// Show persisted warn+ logs.
    Logs {
        #[arg(long)]
        level: Option<String>,
        #[arg(long)]
        batch: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
}

fn parse_mode(s: &str) -> Result<Mode, String> {
    Mode::ALL
        .into_iter()
        .find(|m| m.as_str() == s)
        .ok_or_else(|| format!("unknown mode '{s}'"))
}

fn parse_grade(s: &str) -> Result<GradeLevel, String> {
    GradeLevel::ALL
        .into_iter()
        .find(|g| g.as_str() == s)
        .ok_or_else(|| format!("unknown grade level '{s}'"))
}

fn reword_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
        .join(".reword")
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let _telemetry = init_telemetry(TelemetryConfig::default());

    if let Err(error) = run(cli.command).await {
        eprintln!("reword: {error}");
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Login { api_key, model } => {
            let store = FileCredentialStore::new(reword_dir());
            store.store(&Credentials::new(api_key, model)).await?;
            eprintln!("credentials stored in {}", reword_dir().display());
            Ok(())
        }
        Commands::Run {
            input,
            mode,
            grade,
            max_chunk_size,
            overlap,
            endpoint,
            events,
        } => {
            let text = match input {
                Some(path) => std::fs::read_to_string(path)?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };

            let mut client_config = ClientConfig::default();
            if let Some(endpoint) = endpoint {
                client_config.endpoint = endpoint;
            }
            // REWORD_API_KEY overrides stored credentials.
            let store: Arc<dyn CredentialStore> = match std::env::var("REWORD_API_KEY") {
                Ok(key) if !key.is_empty() => {
                    let model = std::env::var("REWORD_MODEL")
                        .unwrap_or_else(|_| "gpt-4o-mini".to_string());
                    Arc::new(MemoryCredentialStore::with(Credentials::new(key, model)))
                }
                _ => Arc::new(FileCredentialStore::new(reword_dir())),
            };

            let client = TransformClient::new(Arc::new(HttpTransport::new()?), client_config);
            let pipeline = Pipeline::new(
                client,
                Document::from_text(&text),
                store,
                PipelineConfig {
                    max_chunk_size,
                    overlap,
                    ..Default::default()
                },
            );

            let forwarder = events.then(|| {
                let mut rx = pipeline.subscribe();
                tokio::spawn(async move {
                    while let Ok(event) = rx.recv().await {
                        if let Ok(line) = serde_json::to_string(&event) {
                            eprintln!("{line}");
                        }
                    }
                })
            });

            let modes: ModeSet = mode.into_iter().collect();
            let summary = pipeline.transform_selection(&text, modes, grade, None).await?;

            println!("{}", pipeline.document_text());
            eprintln!("{}", summary.summary);
            if let Some(handle) = forwarder {
                handle.abort();
            }
            if summary.outcome.failed() > 0 {
                std::process::exit(2);
            }
            Ok(())
        }
        Commands::Logs { level, batch, limit } => {
            let sink = SqliteLogSink::new(&reword_dir().join("logs.db"))?;
            let records = sink.query(&LogQuery {
                level: level.map(|l| l.to_uppercase()),
                batch_id: batch,
                limit: Some(limit),
                ..Default::default()
            })?;
            for record in records.iter().rev() {
                println!(
                    "{} {:5} {} {}",
                    record.timestamp, record.level, record.target, record.message
                );
            }
            Ok(())
        }
    }
}
