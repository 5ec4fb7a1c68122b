use crate::error::BenchError;
use crate::model::config::Gpt2Config;
use crate::model::files::ModelFiles;
use crate::model::model::{load_safetensors, take_weight, CausalLm, ModelConfig, Weights};
use crate::transformers::layer_norm::LayerNorm;
use crate::transformers::transformer_block::TransformerBlock;
use anyhow::Result;
use log::{debug, info, warn};
use tch::{Kind, Tensor};

/// GPT-2 language model: embeddings, a stack of blocks, a final norm and an
/// output head tied to the token embedding.
pub struct Transformer {
    pub config: Gpt2Config,
    pub wte: Tensor,
    pub wpe: Tensor,
    pub blocks: Vec<TransformerBlock>,
    pub ln_f: LayerNorm,
    pub lm_head: Tensor,
}

impl Transformer {
    pub fn from_weights(config: Gpt2Config, mut weights: Weights) -> Result<Self> {
        let wte = take_weight(&mut weights, "wte.weight")?;
        let wpe = take_weight(&mut weights, "wpe.weight")?;

        let blocks = (0..config.n_layer)
            .map(|layer| TransformerBlock::load(&mut weights, layer, &config))
            .collect::<Result<Vec<_>>>()?;

        let ln_f = LayerNorm::load(&mut weights, "ln_f", config.layer_norm_epsilon)?;
        let lm_head = match weights.remove("lm_head.weight") {
            Some(head) => head,
            None => wte.shallow_clone(),
        };

        if !weights.is_empty() {
            let mut unused: Vec<_> = weights.keys().cloned().collect();
            unused.sort();
            warn!("Ignoring {} unused tensors: {:?}", unused.len(), unused);
        }

        Ok(Self {
            config,
            wte,
            wpe,
            blocks,
            ln_f,
            lm_head,
        })
    }

    pub fn load_from_files(files: &ModelFiles) -> Result<Self> {
        let config = Gpt2Config::from_file(&files.config)?;
        debug!("Model config: {:?}", config);

        let weights = load_safetensors(&files.weights)?;
        let model = Self::from_weights(config, weights)?;
        info!(
            "Built GPT-2 with {} layers, vocabulary {}",
            model.blocks.len(),
            model.config.vocab_size
        );
        Ok(model)
    }

    /// `input_ids` is a 1-D Int64 tensor; returns `[seq_len, vocab_size]`.
    pub fn forward_ids(&self, input_ids: &Tensor) -> Result<Tensor> {
        let seq_len = input_ids.size1()?;
        if seq_len > self.config.n_positions {
            return Err(BenchError::SequenceTooLong {
                len: seq_len,
                max: self.config.n_positions,
            }
            .into());
        }

        let positions = Tensor::arange(seq_len, (Kind::Int64, input_ids.device()));
        let token_embeds = self.wte.f_index_select(0, input_ids)?;
        let position_embeds = self.wpe.f_index_select(0, &positions)?;

        let mut hidden = (token_embeds + position_embeds).unsqueeze(0);
        for block in &self.blocks {
            hidden = block.forward(&hidden)?;
        }

        let hidden = self.ln_f.forward(&hidden);
        Ok(hidden.matmul(&self.lm_head.tr()).squeeze_dim(0))
    }
}

impl CausalLm for Transformer {
    fn forward(&self, input_ids: &[u32]) -> Result<Tensor> {
        let ids: Vec<i64> = input_ids.iter().map(|&id| id as i64).collect();
        let ids = Tensor::f_from_slice(&ids)?;
        tch::no_grad(|| self.forward_ids(&ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    fn tiny_config() -> Gpt2Config {
        Gpt2Config {
            model_type: "gpt2".to_string(),
            vocab_size: 11,
            n_positions: 8,
            n_embd: 8,
            n_layer: 2,
            n_head: 2,
            layer_norm_epsilon: 1e-5,
        }
    }

    const FLOAT_CPU: (Kind, Device) = (Kind::Float, Device::Cpu);

    fn random(shape: &[i64]) -> Tensor {
        Tensor::randn(shape, FLOAT_CPU) * 0.2
    }

    fn tiny_weights(config: &Gpt2Config) -> Weights {
        let d = config.n_embd;
        let mut weights = Weights::new();
        weights.insert("wte.weight".into(), random(&[config.vocab_size, d]));
        weights.insert("wpe.weight".into(), random(&[config.n_positions, d]));
        for layer in 0..config.n_layer {
            let p = format!("h.{layer}");
            weights.insert(format!("{p}.ln_1.weight"), Tensor::ones([d], FLOAT_CPU));
            weights.insert(format!("{p}.ln_1.bias"), Tensor::zeros([d], FLOAT_CPU));
            weights.insert(format!("{p}.attn.c_attn.weight"), random(&[d, 3 * d]));
            weights.insert(format!("{p}.attn.c_attn.bias"), random(&[3 * d]));
            weights.insert(format!("{p}.attn.c_proj.weight"), random(&[d, d]));
            weights.insert(format!("{p}.attn.c_proj.bias"), random(&[d]));
            weights.insert(format!("{p}.ln_2.weight"), Tensor::ones([d], FLOAT_CPU));
            weights.insert(format!("{p}.ln_2.bias"), Tensor::zeros([d], FLOAT_CPU));
            weights.insert(format!("{p}.mlp.c_fc.weight"), random(&[d, 4 * d]));
            weights.insert(format!("{p}.mlp.c_fc.bias"), random(&[4 * d]));
            weights.insert(format!("{p}.mlp.c_proj.weight"), random(&[4 * d, d]));
            weights.insert(format!("{p}.mlp.c_proj.bias"), random(&[d]));
        }
        weights.insert("ln_f.weight".into(), Tensor::ones([d], FLOAT_CPU));
        weights.insert("ln_f.bias".into(), Tensor::zeros([d], FLOAT_CPU));
        weights
    }

    fn tiny_model() -> Transformer {
        tch::manual_seed(7);
        let config = tiny_config();
        let weights = tiny_weights(&config);
        Transformer::from_weights(config, weights).unwrap()
    }

    #[test]
    fn forward_scores_every_position() {
        let model = tiny_model();
        let logits = model.forward(&[1, 2, 3]).unwrap();
        assert_eq!(logits.size(), vec![3, 11]);
    }

    #[test]
    fn earlier_positions_ignore_later_tokens() {
        let model = tiny_model();
        let short = model.forward(&[4, 5, 6]).unwrap();
        let long = model.forward(&[4, 5, 6, 9, 10]).unwrap();

        let prefix = long.narrow(0, 0, 3);
        assert!(prefix.allclose(&short, 1e-5, 1e-5, false));
    }

    #[test]
    fn rejects_inputs_longer_than_context() {
        let model = tiny_model();
        let err = model.forward(&[0; 9]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BenchError>(),
            Some(BenchError::SequenceTooLong { len: 9, max: 8 })
        ));
    }

    #[test]
    fn missing_block_weight_is_an_error() {
        let config = tiny_config();
        let mut weights = tiny_weights(&config);
        weights.remove("h.1.mlp.c_fc.bias");

        let err = Transformer::from_weights(config, weights).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<BenchError>(),
            Some(BenchError::MissingWeight(name)) if name == "h.1.mlp.c_fc.bias"
        ));
    }

    #[test]
    fn head_is_tied_to_token_embedding() {
        let model = tiny_model();
        assert!(model.lm_head.allclose(&model.wte, 0.0, 0.0, false));
    }
}
