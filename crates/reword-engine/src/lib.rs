mod commands;
mod pipeline;

pub use commands::{handle_command, Command, CommandReply};
pub use pipeline::{Pipeline, PipelineConfig, TransformSummary};
