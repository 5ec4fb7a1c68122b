use crate::config::BenchConfig;
use crate::inference::{next_token_probabilities, TEXT};
use crate::loader::{load_checkpoint, ModelSource};
use crate::report::{Prediction, Reporter};
use crate::tokenizer::TextTokenizer;
use crate::topk::{top_k, TOP_K};
use anyhow::Result;
use log::info;
use std::time::Instant;

/// Runs the benchmark once: load, score the fixed sentence, report the top
/// 10 next tokens. Returns the reported rows.
pub fn execute<S: ModelSource>(config: &BenchConfig, source: &S) -> Result<Vec<Prediction>> {
    println!("{}", config.cache_dir_label());

    let start_time = Instant::now();
    let checkpoint = load_checkpoint(source, &config.checkpoint)?;
    info!("Checkpoint {} ready in {:?}", config.checkpoint, start_time.elapsed());

    let probs = next_token_probabilities(&checkpoint.model, &checkpoint.tokenizer, TEXT)?;
    let candidates = top_k(&probs, TOP_K)?;

    let predictions = candidates
        .iter()
        .map(|candidate| -> Result<Prediction> {
            Ok(Prediction {
                token: checkpoint.tokenizer.decode(&[candidate.token_id])?,
                probability: candidate.probability,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Reporter::new(config.output_path.clone()).emit(&predictions)?;
    Ok(predictions)
}
