use crate::error::BenchError;
use anyhow::Result;
use std::cmp::Ordering;
use tch::Tensor;

pub const TOP_K: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub token_id: u32,
    pub probability: f32,
}

/// The `k` most probable entries of a 1-D distribution, in descending order.
/// Equal probabilities inside the selected window are ordered by ascending
/// token id.
pub fn top_k(probs: &Tensor, k: i64) -> Result<Vec<Candidate>> {
    let vocab_size = probs.size1()?;
    if vocab_size < k {
        return Err(BenchError::TooFewCandidates { k, vocab_size }.into());
    }

    let (values, indices) = probs.f_topk(k, -1, true, true)?;
    let values = Vec::<f32>::try_from(&values)?;
    let indices = Vec::<i64>::try_from(&indices)?;

    let mut candidates: Vec<Candidate> = indices
        .into_iter()
        .zip(values)
        .map(|(index, probability)| Candidate {
            token_id: index as u32,
            probability,
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(Ordering::Equal)
            .then(a.token_id.cmp(&b.token_id))
    });

    Ok(candidates)
}
