use thiserror::Error;

/// Failures detected by this crate itself. Errors raised by tch, hf-hub,
/// safetensors or tokenizers are passed through untouched.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("Tokenizer not found for {repo_id}")]
    TokenizerNotFound { repo_id: String },

    #[error("checkpoint identifier must not be empty")]
    EmptyIdentifier,

    #[error("input text encoded to zero tokens")]
    EmptyInput,

    #[error("input of {len} tokens exceeds the model context of {max}")]
    SequenceTooLong { len: i64, max: i64 },

    #[error("cannot select top {k} from a vocabulary of {vocab_size}")]
    TooFewCandidates { k: i64, vocab_size: i64 },

    #[error("unsupported model architecture '{0}' (only gpt2 is supported)")]
    UnsupportedArchitecture(String),

    #[error("invalid model config: {0}")]
    InvalidConfig(String),

    #[error("unsupported dtype {dtype} for weight '{name}'")]
    UnsupportedDtype { name: String, dtype: String },

    #[error("weight '{0}' not found in checkpoint")]
    MissingWeight(String),
}
