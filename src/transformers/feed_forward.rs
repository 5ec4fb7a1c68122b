use crate::model::model::Weights;
use crate::transformers::conv1d::Conv1d;
use anyhow::Result;
use tch::Tensor;

pub struct FeedForward {
    pub c_fc: Conv1d,
    pub c_proj: Conv1d,
}

impl FeedForward {
    pub fn new(c_fc: Conv1d, c_proj: Conv1d) -> Self {
        FeedForward { c_fc, c_proj }
    }

    pub fn load(weights: &mut Weights, prefix: &str) -> Result<Self> {
        let c_fc = Conv1d::load(weights, &format!("{prefix}.c_fc"))?;
        let c_proj = Conv1d::load(weights, &format!("{prefix}.c_proj"))?;
        Ok(Self::new(c_fc, c_proj))
    }

    pub fn forward(&self, x: &Tensor) -> Tensor {
        // gelu_new in the reference checkpoints is the tanh approximation
        let hidden = self.c_fc.forward(x).gelu("tanh");
        self.c_proj.forward(&hidden)
    }
}
