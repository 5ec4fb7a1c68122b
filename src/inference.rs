use crate::error::BenchError;
use crate::model::model::CausalLm;
use crate::tokenizer::TextTokenizer;
use anyhow::Result;
use log::debug;
use tch::{Kind, Tensor};

/// Prompt scored by the benchmark.
pub const TEXT: &str = "When Mary and John went to the store, John gave a drink to";

/// Probability distribution over the vocabulary for the token following
/// `text`. Plain softmax of the final position's scores.
pub fn next_token_probabilities<M, T>(model: &M, tokenizer: &T, text: &str) -> Result<Tensor>
where
    M: CausalLm,
    T: TextTokenizer,
{
    let input_ids = tokenizer.encode(text)?;
    if input_ids.is_empty() {
        return Err(BenchError::EmptyInput.into());
    }
    debug!("Input text {:?} encoded to {} tokens: {:?}", text, input_ids.len(), input_ids);

    let logits = model.forward(&input_ids)?;
    debug!("Model output shape: {:?}", logits.size());

    let last_token_logits = logits.f_select(0, -1)?;
    Ok(last_token_logits.f_softmax(-1, Kind::Float)?)
}
