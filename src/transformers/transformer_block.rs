use crate::model::config::Gpt2Config;
use crate::model::model::Weights;
use crate::transformers::attention::Attention;
use crate::transformers::feed_forward::FeedForward;
use crate::transformers::layer_norm::LayerNorm;
use anyhow::Result;
use tch::Tensor;

/// Pre-norm block: `x + attn(ln_1(x))`, then `x + mlp(ln_2(x))`.
pub struct TransformerBlock {
    pub ln_1: LayerNorm,
    pub attention: Attention,
    pub ln_2: LayerNorm,
    pub feed_forward: FeedForward,
}

impl TransformerBlock {
    pub fn new(
        ln_1: LayerNorm,
        attention: Attention,
        ln_2: LayerNorm,
        feed_forward: FeedForward,
    ) -> Self {
        Self {
            ln_1,
            attention,
            ln_2,
            feed_forward,
        }
    }

    pub fn load(weights: &mut Weights, layer: i64, config: &Gpt2Config) -> Result<Self> {
        let prefix = format!("h.{layer}");
        let eps = config.layer_norm_epsilon;

        Ok(Self::new(
            LayerNorm::load(weights, &format!("{prefix}.ln_1"), eps)?,
            Attention::load(
                weights,
                &format!("{prefix}.attn"),
                config.n_head,
                config.head_dim(),
            )?,
            LayerNorm::load(weights, &format!("{prefix}.ln_2"), eps)?,
            FeedForward::load(weights, &format!("{prefix}.mlp"))?,
        ))
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = x + self.attention.forward(&self.ln_1.forward(x))?;
        let out = &x + self.feed_forward.forward(&self.ln_2.forward(&x));
        Ok(out)
    }
}
