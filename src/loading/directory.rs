use crate::config::CheckpointId;
use crate::loader::ModelSource;
use crate::model::files::ModelFiles;
use crate::tokenizer::HfTokenizer;
use crate::transformers::transformer::Transformer;
use anyhow::Result;
use log::debug;

/// Treats the checkpoint identifier as a path to a directory holding
/// `config.json`, `*.safetensors` and optionally `tokenizer.json`.
pub struct DirectorySource;

impl ModelSource for DirectorySource {
    type Model = Transformer;
    type Tokenizer = HfTokenizer;

    fn resolve_model(&self, id: &CheckpointId) -> Result<Transformer> {
        let files = ModelFiles::from_directory(id.as_str())?;
        debug!("Checkpoint files: {:?}", files);
        Transformer::load_from_files(&files)
    }

    fn resolve_tokenizer(&self, id: &CheckpointId) -> Result<Option<HfTokenizer>> {
        let files = ModelFiles::from_directory(id.as_str())?;
        files
            .tokenizer_json
            .map(|path| -> Result<HfTokenizer> {
                let tokenizer = HfTokenizer::from_file(&path)?;
                debug!("Tokenizer vocabulary: {}", tokenizer.vocab_size());
                Ok(tokenizer)
            })
            .transpose()
    }
}
