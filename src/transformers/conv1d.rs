use crate::model::model::{take_weight, Weights};
use anyhow::Result;
use tch::Tensor;

/// GPT-2 style projection. The weight is stored `[in, out]`, so the layer
/// computes `x @ W + b` without a transpose.
pub struct Conv1d {
    pub weight: Tensor,
    pub bias: Tensor,
}

impl Conv1d {
    pub fn load(weights: &mut Weights, prefix: &str) -> Result<Self> {
        Ok(Self {
            weight: take_weight(weights, &format!("{prefix}.weight"))?,
            bias: take_weight(weights, &format!("{prefix}.bias"))?,
        })
    }

    pub fn forward(&self, x: &Tensor) -> Tensor {
        x.matmul(&self.weight) + &self.bias
    }
}
