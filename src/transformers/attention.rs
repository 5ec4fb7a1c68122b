use crate::model::model::Weights;
use crate::transformers::conv1d::Conv1d;
use anyhow::Result;
use tch::{Kind, Tensor};

/// Causal multi-head self-attention with a fused QKV projection.
pub struct Attention {
    pub c_attn: Conv1d,
    pub c_proj: Conv1d,
    pub num_heads: i64,
    pub head_dim: i64,
}

impl Attention {
    pub fn new(c_attn: Conv1d, c_proj: Conv1d, num_heads: i64, head_dim: i64) -> Self {
        Self {
            c_attn,
            c_proj,
            num_heads,
            head_dim,
        }
    }

    pub fn load(
        weights: &mut Weights,
        prefix: &str,
        num_heads: i64,
        head_dim: i64,
    ) -> Result<Self> {
        let c_attn = Conv1d::load(weights, &format!("{prefix}.c_attn"))?;
        let c_proj = Conv1d::load(weights, &format!("{prefix}.c_proj"))?;
        Ok(Self::new(c_attn, c_proj, num_heads, head_dim))
    }

    /// `x` is `[batch, seq_len, hidden]`.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (batch, seq_len, hidden) = x.size3()?;

        let qkv = self.c_attn.forward(x).split(hidden, -1);
        let heads = [batch, seq_len, self.num_heads, self.head_dim];
        let q = qkv[0].f_reshape(heads)?.transpose(1, 2);
        let k = qkv[1].f_reshape(heads)?.transpose(1, 2);
        let v = qkv[2].f_reshape(heads)?.transpose(1, 2);

        let scale = 1.0 / (self.head_dim as f64).sqrt();
        let scores = q.matmul(&k.transpose(-2, -1)) * scale;

        // true above the diagonal, i.e. for future positions
        let future = Tensor::ones([seq_len, seq_len], (Kind::Float, x.device()))
            .tril(0)
            .eq(0.0);
        let scores = scores.masked_fill(&future, f64::NEG_INFINITY);

        let out = scores
            .softmax(-1, Kind::Float)
            .matmul(&v)
            .transpose(1, 2)
            .contiguous()
            .reshape([batch, seq_len, hidden]);

        Ok(self.c_proj.forward(&out))
    }
}
