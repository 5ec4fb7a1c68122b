use crate::config::{BenchConfig, CheckpointId};
use crate::error::BenchError;
use crate::loading::directory::DirectorySource;
use crate::loading::hub::HubSource;
use crate::model::model::CausalLm;
use crate::tokenizer::{HfTokenizer, TextTokenizer};
use crate::transformers::transformer::Transformer;
use anyhow::Result;
use log::info;
use std::path::Path;

/// Something that can materialise a model and its tokenizer from a
/// checkpoint identifier.
pub trait ModelSource {
    type Model: CausalLm;
    type Tokenizer: TextTokenizer;

    fn resolve_model(&self, id: &CheckpointId) -> Result<Self::Model>;

    /// `Ok(None)` when the checkpoint ships no tokenizer.
    fn resolve_tokenizer(&self, id: &CheckpointId) -> Result<Option<Self::Tokenizer>>;
}

pub struct Checkpoint<M, T> {
    pub model: M,
    pub tokenizer: T,
}

/// Resolves the model, then the tokenizer. A checkpoint without a tokenizer
/// is a configuration error.
pub fn load_checkpoint<S: ModelSource>(
    source: &S,
    id: &CheckpointId,
) -> Result<Checkpoint<S::Model, S::Tokenizer>> {
    let model = source.resolve_model(id)?;
    let tokenizer = source
        .resolve_tokenizer(id)?
        .ok_or_else(|| BenchError::TokenizerNotFound {
            repo_id: id.to_string(),
        })?;

    Ok(Checkpoint { model, tokenizer })
}

/// Local directory when the identifier names one, the hub otherwise.
pub enum CheckpointSource {
    Directory(DirectorySource),
    Hub(HubSource),
}

impl CheckpointSource {
    pub fn for_config(config: &BenchConfig) -> Result<Self> {
        if Path::new(config.checkpoint.as_str()).is_dir() {
            info!("Loading {} from local directory", config.checkpoint);
            return Ok(Self::Directory(DirectorySource));
        }

        info!("Loading {} from the hub (revision {})", config.checkpoint, config.revision);
        let hub = HubSource::new(config.cache_dir.as_deref(), &config.revision)?;
        Ok(Self::Hub(hub))
    }
}

impl ModelSource for CheckpointSource {
    type Model = Transformer;
    type Tokenizer = HfTokenizer;

    fn resolve_model(&self, id: &CheckpointId) -> Result<Transformer> {
        match self {
            Self::Directory(source) => source.resolve_model(id),
            Self::Hub(source) => source.resolve_model(id),
        }
    }

    fn resolve_tokenizer(&self, id: &CheckpointId) -> Result<Option<HfTokenizer>> {
        match self {
            Self::Directory(source) => source.resolve_tokenizer(id),
            Self::Hub(source) => source.resolve_tokenizer(id),
        }
    }
}
