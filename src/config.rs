use crate::error::BenchError;
use crate::report;
use anyhow::Result;
use clap::Parser;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_OUTPUT_DIR: &str = "benchmark/output";

/// Next-token accuracy benchmark: prints the 10 most probable continuations
/// of a fixed sentence for a pretrained checkpoint.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Hub repository id (e.g. openai-community/gpt2) or a local checkpoint directory
    pub repo_id: String,

    /// Directory the report file is written to
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Model cache root; the hub cache lives in its `hub` subdirectory
    #[arg(long, env = "HF_HOME")]
    pub cache_dir: Option<PathBuf>,

    /// Hub revision to fetch
    #[arg(long, default_value = "main")]
    pub revision: String,

    /// Only print the table, do not write the report file
    #[arg(long)]
    pub no_save: bool,
}

/// Checkpoint identifier, guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointId(String);

impl CheckpointId {
    pub fn parse(raw: &str) -> Result<Self, BenchError> {
        let trimmed = raw.trim();
        if trimmed.trim_end_matches('/').is_empty() {
            return Err(BenchError::EmptyIdentifier);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segment after the last `/`, ignoring trailing separators.
    pub fn short_name(&self) -> &str {
        let id = self.0.trim_end_matches('/');
        id.rsplit('/').next().unwrap_or(id)
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolved run configuration handed to the pipeline.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub checkpoint: CheckpointId,
    pub output_path: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub revision: String,
}

impl BenchConfig {
    pub fn from_args(args: Args) -> Result<Self> {
        let checkpoint = CheckpointId::parse(&args.repo_id)?;
        let output_path =
            (!args.no_save).then(|| report::output_path(&args.output_dir, &checkpoint));

        Ok(Self {
            checkpoint,
            output_path,
            cache_dir: args.cache_dir,
            revision: args.revision,
        })
    }

    /// The cache directory as printed before loading: the bare path, or
    /// `None` when the hub default applies.
    pub fn cache_dir_label(&self) -> String {
        match &self.cache_dir {
            Some(path) => path.display().to_string(),
            None => "None".to_string(),
        }
    }
}
