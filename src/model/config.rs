use crate::error::BenchError;
use crate::model::model::ModelConfig;
use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

/// Subset of a GPT-2 `config.json` needed for the forward pass.
#[derive(Debug, Clone, Deserialize)]
pub struct Gpt2Config {
    #[serde(default = "default_model_type")]
    pub model_type: String,
    pub vocab_size: i64,
    pub n_positions: i64,
    pub n_embd: i64,
    pub n_layer: i64,
    pub n_head: i64,
    #[serde(default = "default_layer_norm_epsilon")]
    pub layer_norm_epsilon: f64,
}

fn default_model_type() -> String {
    "gpt2".to_string()
}

fn default_layer_norm_epsilon() -> f64 {
    1e-5
}

impl Gpt2Config {
    pub fn head_dim(&self) -> i64 {
        self.n_embd / self.n_head
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Gpt2Config = serde_json::from_str(json)?;
        if config.model_type != "gpt2" {
            return Err(BenchError::UnsupportedArchitecture(config.model_type).into());
        }
        if config.n_head <= 0 {
            let msg = format!("n_head must be positive, got {}", config.n_head);
            return Err(BenchError::InvalidConfig(msg).into());
        }
        if config.n_embd % config.n_head != 0 {
            let msg = format!(
                "n_embd {} is not divisible by n_head {}",
                config.n_embd, config.n_head
            );
            return Err(BenchError::InvalidConfig(msg).into());
        }
        Ok(config)
    }
}

impl ModelConfig for Gpt2Config {
    fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)?;
        Self::from_json(&config_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GPT2_CONFIG: &str = r#"{
        "activation_function": "gelu_new",
        "architectures": ["GPT2LMHeadModel"],
        "layer_norm_epsilon": 1e-05,
        "model_type": "gpt2",
        "n_ctx": 1024,
        "n_embd": 768,
        "n_head": 12,
        "n_layer": 12,
        "n_positions": 1024,
        "vocab_size": 50257
    }"#;

    #[test]
    fn parses_hub_config() {
        let config = Gpt2Config::from_json(GPT2_CONFIG).unwrap();
        assert_eq!(config.vocab_size, 50257);
        assert_eq!(config.n_layer, 12);
        assert_eq!(config.head_dim(), 64);
    }

    #[test]
    fn rejects_other_architectures() {
        let json = GPT2_CONFIG.replace("\"model_type\": \"gpt2\"", "\"model_type\": \"llama\"");
        let err = Gpt2Config::from_json(&json).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BenchError>(),
            Some(BenchError::UnsupportedArchitecture(arch)) if arch == "llama"
        ));
    }

    #[test]
    fn rejects_zero_heads() {
        let json = GPT2_CONFIG.replace("\"n_head\": 12", "\"n_head\": 0");
        let err = Gpt2Config::from_json(&json).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BenchError>(),
            Some(BenchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_hidden_size_not_divisible_by_heads() {
        let json = GPT2_CONFIG.replace("\"n_head\": 12", "\"n_head\": 7");
        let err = Gpt2Config::from_json(&json).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid model config: n_embd 768 is not divisible by n_head 7"
        );
    }
}
