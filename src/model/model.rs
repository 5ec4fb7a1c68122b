use crate::error::BenchError;
use anyhow::Result;
use half::{bf16, f16};
use log::{debug, info};
use rayon::prelude::*;
use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tch::Tensor;

pub trait ModelConfig: Sized + Send + Sync {
    fn from_file(path: &Path) -> Result<Self>;
}

/// A language model scoring every vocabulary entry at every input position.
pub trait CausalLm {
    /// Raw scores of shape `[input_ids.len(), vocab_size]`.
    fn forward(&self, input_ids: &[u32]) -> Result<Tensor>;
}

/// Named checkpoint tensors, widened to f32.
pub type Weights = HashMap<String, Tensor>;

pub fn load_safetensors(paths: &[PathBuf]) -> Result<Weights> {
    let start_time = Instant::now();
    let mut weights = Weights::new();

    for path in paths {
        debug!("reading {:?}", path);
        let buffer = std::fs::read(path)?;
        let safetensors = SafeTensors::deserialize(&buffer)?;
        weights.extend(from_safetensors(&safetensors)?);
    }

    info!("Loaded {} tensors in {:?}", weights.len(), start_time.elapsed());
    Ok(weights)
}

pub fn from_safetensors(st: &SafeTensors) -> Result<Weights> {
    st.names()
        .par_iter()
        .filter(|name| !is_attention_buffer(name))
        .map(|name| -> Result<(String, Tensor)> {
            let view = st.tensor(name)?;
            let tensor = tensor_from_view(name, &view)?;
            Ok((normalize_name(name), tensor))
        })
        .collect()
}

pub fn tensor_from_view(name: &str, view: &TensorView) -> Result<Tensor> {
    let shape: Vec<i64> = view.shape().iter().map(|&x| x as i64).collect();
    let raw_data = view.data();

    let values: Vec<f32> = match view.dtype() {
        Dtype::F32 => bytemuck::pod_collect_to_vec::<u8, f32>(raw_data),
        Dtype::F16 => bytemuck::pod_collect_to_vec::<u8, u16>(raw_data)
            .into_iter()
            .map(|bits| f16::from_bits(bits).to_f32())
            .collect(),
        Dtype::BF16 => bytemuck::pod_collect_to_vec::<u8, u16>(raw_data)
            .into_iter()
            .map(|bits| bf16::from_bits(bits).to_f32())
            .collect(),
        other => {
            return Err(BenchError::UnsupportedDtype {
                name: name.to_string(),
                dtype: format!("{:?}", other),
            }
            .into())
        }
    };

    Ok(Tensor::f_from_slice(&values)?.f_reshape(shape.as_slice())?)
}

/// Removes the module prefix some exports put in front of every weight.
pub fn normalize_name(name: &str) -> String {
    name.strip_prefix("transformer.").unwrap_or(name).to_string()
}

// causal mask buffers stored next to the attention weights
fn is_attention_buffer(name: &str) -> bool {
    name.ends_with(".attn.bias") || name.ends_with(".attn.masked_bias")
}

pub fn take_weight(weights: &mut Weights, name: &str) -> Result<Tensor> {
    weights
        .remove(name)
        .ok_or_else(|| BenchError::MissingWeight(name.to_string()).into())
}
