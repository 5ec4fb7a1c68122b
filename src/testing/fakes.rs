//! In-memory stand-ins for a checkpoint, returning canned scores.

use crate::config::CheckpointId;
use crate::loader::ModelSource;
use crate::model::model::CausalLm;
use crate::tokenizer::TextTokenizer;
use anyhow::Result;
use std::cell::Cell;
use std::rc::Rc;
use tch::Tensor;

/// Scores position `i` with `rows[i]`, repeating the last row for longer
/// inputs. Counts forward passes.
pub struct FakeModel {
    rows: Vec<Vec<f32>>,
    calls: Rc<Cell<usize>>,
}

impl FakeModel {
    pub fn new(logits: Vec<f32>) -> Self {
        Self::with_rows(vec![logits])
    }

    pub fn with_rows(rows: Vec<Vec<f32>>) -> Self {
        assert!(!rows.is_empty(), "at least one row of logits");
        Self {
            rows,
            calls: Rc::new(Cell::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    /// Shared handle on the call counter, readable after the model moved.
    pub fn call_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.calls)
    }
}

impl CausalLm for FakeModel {
    fn forward(&self, input_ids: &[u32]) -> Result<Tensor> {
        self.calls.set(self.calls.get() + 1);

        let last = self.rows.len() - 1;
        let rows: Vec<Tensor> = (0..input_ids.len())
            .map(|pos| Tensor::from_slice(&self.rows[pos.min(last)]))
            .collect();
        Ok(Tensor::f_stack(&rows, 0)?)
    }
}

/// Whitespace tokenizer over a fixed vocabulary. Unknown words map to id 0.
pub struct FakeTokenizer {
    vocab: Vec<String>,
}

impl FakeTokenizer {
    /// Vocabulary of ` tok0`, ` tok1`, ...
    pub fn new(vocab_size: usize) -> Self {
        Self::with_vocab((0..vocab_size).map(|i| format!(" tok{i}")).collect())
    }

    pub fn with_vocab(vocab: Vec<String>) -> Self {
        Self { vocab }
    }
}

impl TextTokenizer for FakeTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        Ok(text
            .split_whitespace()
            .map(|word| {
                self.vocab
                    .iter()
                    .position(|entry| entry.trim() == word)
                    .unwrap_or(0) as u32
            })
            .collect())
    }

    fn decode(&self, token_ids: &[u32]) -> Result<String> {
        token_ids
            .iter()
            .map(|&id| {
                self.vocab
                    .get(id as usize)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("token id {id} out of range"))
            })
            .collect()
    }
}

/// Hands out a model built from canned logits and, optionally, a tokenizer.
pub struct FakeSource {
    pub logits: Vec<f32>,
    pub vocab: Option<Vec<String>>,
    model_calls: Cell<Option<Rc<Cell<usize>>>>,
}

impl FakeSource {
    pub fn new(logits: Vec<f32>, vocab: Option<Vec<String>>) -> Self {
        Self {
            logits,
            vocab,
            model_calls: Cell::new(None),
        }
    }

    /// Forward passes run by the last model this source resolved.
    pub fn forward_calls(&self) -> usize {
        let counter = self.model_calls.take();
        let calls = counter.as_ref().map_or(0, |c| c.get());
        self.model_calls.set(counter);
        calls
    }
}

impl ModelSource for FakeSource {
    type Model = FakeModel;
    type Tokenizer = FakeTokenizer;

    fn resolve_model(&self, _id: &CheckpointId) -> Result<FakeModel> {
        let model = FakeModel::new(self.logits.clone());
        self.model_calls.set(Some(model.call_counter()));
        Ok(model)
    }

    fn resolve_tokenizer(&self, _id: &CheckpointId) -> Result<Option<FakeTokenizer>> {
        Ok(self.vocab.clone().map(FakeTokenizer::with_vocab))
    }
}
