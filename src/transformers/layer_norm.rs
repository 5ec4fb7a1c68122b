use crate::model::model::{take_weight, Weights};
use anyhow::Result;
use tch::Tensor;

pub struct LayerNorm {
    pub weight: Tensor,
    pub bias: Tensor,
    pub eps: f64,
}

impl LayerNorm {
    pub fn new(weight: Tensor, bias: Tensor, eps: f64) -> Self {
        Self { weight, bias, eps }
    }

    pub fn load(weights: &mut Weights, prefix: &str, eps: f64) -> Result<Self> {
        let weight = take_weight(weights, &format!("{prefix}.weight"))?;
        let bias = take_weight(weights, &format!("{prefix}.bias"))?;
        Ok(Self::new(weight, bias, eps))
    }

    pub fn forward(&self, x: &Tensor) -> Tensor {
        let dim = self.weight.size()[0];
        x.layer_norm([dim], Some(&self.weight), Some(&self.bias), self.eps, false)
    }
}
