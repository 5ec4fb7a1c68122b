use crate::config::CheckpointId;
use crate::loader::ModelSource;
use crate::model::files::ModelFiles;
use crate::tokenizer::HfTokenizer;
use crate::transformers::transformer::Transformer;
use anyhow::Result;
use hf_hub::api::sync::{Api, ApiBuilder, ApiRepo};
use hf_hub::{Cache, Repo, RepoType};
use log::{debug, info};
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

const SINGLE_WEIGHTS: &str = "model.safetensors";
const WEIGHTS_INDEX: &str = "model.safetensors.index.json";
const TOKENIZER_JSON: &str = "tokenizer.json";

/// Fetches checkpoints from the Hugging Face hub through the local cache.
///
/// Files already in the cache are used without touching the network. The
/// repository listing is only requested on a cache miss, and at most once
/// per repository.
pub struct HubSource {
    api: Api,
    cache: Cache,
    revision: String,
    listings: RefCell<HashMap<String, Vec<String>>>,
}

/// Where an optional repository file comes from.
#[derive(Debug, PartialEq, Eq)]
enum Presence {
    Cached(PathBuf),
    Remote,
    Absent,
}

#[derive(Deserialize)]
struct SafetensorsIndex {
    weight_map: HashMap<String, String>,
}

impl HubSource {
    /// `cache_root` follows the `HF_HOME` layout: downloads go to `<root>/hub`.
    pub fn new(cache_root: Option<&Path>, revision: &str) -> Result<Self> {
        let cache = match cache_root {
            Some(root) => Cache::new(root.join("hub")),
            None => Cache::default(),
        };
        let api = ApiBuilder::new()
            .with_progress(false)
            .with_cache_dir(cache.path().clone())
            .build()?;

        Ok(Self {
            api,
            cache,
            revision: revision.to_string(),
            listings: RefCell::new(HashMap::new()),
        })
    }

    fn repo_ref(&self, id: &CheckpointId) -> Repo {
        Repo::with_revision(id.to_string(), RepoType::Model, self.revision.clone())
    }

    fn repo(&self, id: &CheckpointId) -> ApiRepo {
        self.api.repo(self.repo_ref(id))
    }

    fn cached(&self, id: &CheckpointId, filename: &str) -> Option<PathBuf> {
        self.cache.repo(self.repo_ref(id)).get(filename)
    }

    fn listing(&self, id: &CheckpointId) -> Result<Vec<String>> {
        if let Some(files) = self.listings.borrow().get(id.as_str()) {
            return Ok(files.clone());
        }

        let info = self.repo(id).info()?;
        let files: Vec<String> = info.siblings.into_iter().map(|s| s.rfilename).collect();
        debug!("Listed {} files in {}", files.len(), id);
        self.listings
            .borrow_mut()
            .insert(id.to_string(), files.clone());
        Ok(files)
    }

    /// Path to `filename`, downloading it if needed. `None` when the
    /// repository does not publish it.
    fn fetch_optional(&self, id: &CheckpointId, filename: &str) -> Result<Option<PathBuf>> {
        match presence(self.cached(id, filename), filename, || self.listing(id))? {
            Presence::Cached(path) => {
                debug!("Using cached {} for {}", filename, id);
                Ok(Some(path))
            }
            Presence::Remote => Ok(Some(self.repo(id).get(filename)?)),
            Presence::Absent => Ok(None),
        }
    }

    fn weight_files(&self, id: &CheckpointId) -> Result<Vec<PathBuf>> {
        if let Some(path) = self.cached(id, SINGLE_WEIGHTS) {
            return Ok(vec![path]);
        }

        let index = match self.cached(id, WEIGHTS_INDEX) {
            Some(path) => path,
            None => {
                if let Some(path) = self.fetch_optional(id, SINGLE_WEIGHTS)? {
                    return Ok(vec![path]);
                }
                match self.fetch_optional(id, WEIGHTS_INDEX)? {
                    Some(path) => path,
                    None => anyhow::bail!("no safetensors weights published for {}", id),
                }
            }
        };

        let repo = self.repo(id);
        let shards = shard_names(&std::fs::read_to_string(index)?)?
            .iter()
            .map(|shard| repo.get(shard))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(shards)
    }
}

impl ModelSource for HubSource {
    type Model = Transformer;
    type Tokenizer = HfTokenizer;

    fn resolve_model(&self, id: &CheckpointId) -> Result<Transformer> {
        let config = self.repo(id).get("config.json")?;
        let weights = self.weight_files(id)?;
        info!("Fetched {} weight file(s) for {}", weights.len(), id);

        let files = ModelFiles {
            weights,
            config,
            tokenizer_json: None,
        };
        Transformer::load_from_files(&files)
    }

    fn resolve_tokenizer(&self, id: &CheckpointId) -> Result<Option<HfTokenizer>> {
        match self.fetch_optional(id, TOKENIZER_JSON)? {
            Some(path) => Ok(Some(HfTokenizer::from_file(path)?)),
            None => {
                debug!("{} has no {}", id, TOKENIZER_JSON);
                Ok(None)
            }
        }
    }
}

/// A cache hit wins outright; otherwise the repository listing decides.
fn presence<F>(cached: Option<PathBuf>, filename: &str, list_files: F) -> Result<Presence>
where
    F: FnOnce() -> Result<Vec<String>>,
{
    if let Some(path) = cached {
        return Ok(Presence::Cached(path));
    }

    if list_files()?.iter().any(|f| f == filename) {
        Ok(Presence::Remote)
    } else {
        Ok(Presence::Absent)
    }
}

fn shard_names(index_json: &str) -> Result<Vec<String>> {
    let index: SafetensorsIndex = serde_json::from_str(index_json)?;
    let shards: BTreeSet<String> = index.weight_map.into_values().collect();
    Ok(shards.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::TextTokenizer;
    use std::fs;
    use tempfile::TempDir;

    const COMMIT: &str = "0123456789abcdef0123456789abcdef01234567";

    const WORD_LEVEL: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": { "[UNK]": 0, "the": 1, "cat": 2 },
            "unk_token": "[UNK]"
        }
    }"#;

    fn names(files: &[&str]) -> Vec<String> {
        files.iter().map(|f| f.to_string()).collect()
    }

    /// Lays out `<root>/hub/models--<org>--<name>` the way hf-hub leaves it
    /// after a download of `main`.
    fn warm_cache(root: &Path, repo_id: &str, files: &[(&str, &str)]) {
        let repo_dir = root
            .join("hub")
            .join(format!("models--{}", repo_id.replace('/', "--")));
        fs::create_dir_all(repo_dir.join("refs")).unwrap();
        fs::write(repo_dir.join("refs").join("main"), COMMIT).unwrap();

        let snapshot = repo_dir.join("snapshots").join(COMMIT);
        fs::create_dir_all(&snapshot).unwrap();
        for (name, contents) in files {
            fs::write(snapshot.join(name), contents).unwrap();
        }
    }

    #[test]
    fn cache_hit_skips_the_listing() {
        let cached = PathBuf::from("/cache/tokenizer.json");
        let found = presence(Some(cached.clone()), TOKENIZER_JSON, || {
            panic!("listing requested despite a cache hit")
        })
        .unwrap();
        assert_eq!(found, Presence::Cached(cached));
    }

    #[test]
    fn listed_file_is_downloaded() {
        let found = presence(None, TOKENIZER_JSON, || {
            Ok(names(&["config.json", "tokenizer.json"]))
        })
        .unwrap();
        assert_eq!(found, Presence::Remote);
    }

    #[test]
    fn unlisted_file_is_absent() {
        let found = presence(None, TOKENIZER_JSON, || {
            Ok(names(&["config.json", "model.safetensors"]))
        })
        .unwrap();
        assert_eq!(found, Presence::Absent);
    }

    #[test]
    fn listing_failure_propagates() {
        let result = presence(None, TOKENIZER_JSON, || anyhow::bail!("offline"));
        assert_eq!(result.unwrap_err().to_string(), "offline");
    }

    #[test]
    fn warm_cache_resolves_tokenizer_offline() {
        let dir = TempDir::new().expect("create temp dir");
        warm_cache(dir.path(), "org/tiny-gpt2", &[(TOKENIZER_JSON, WORD_LEVEL)]);
        let source = HubSource::new(Some(dir.path()), "main").unwrap();
        let id = CheckpointId::parse("org/tiny-gpt2").unwrap();

        let tokenizer = source.resolve_tokenizer(&id).unwrap().unwrap();

        assert_eq!(tokenizer.encode("the cat").unwrap(), vec![1, 2]);
        assert!(source.listings.borrow().is_empty());
    }

    #[test]
    fn warm_cache_prefers_single_weight_file() {
        let dir = TempDir::new().expect("create temp dir");
        warm_cache(
            dir.path(),
            "org/tiny-gpt2",
            &[(SINGLE_WEIGHTS, ""), (WEIGHTS_INDEX, "{}")],
        );
        let source = HubSource::new(Some(dir.path()), "main").unwrap();
        let id = CheckpointId::parse("org/tiny-gpt2").unwrap();

        let weights = source.weight_files(&id).unwrap();

        assert_eq!(weights.len(), 1);
        assert!(weights[0].ends_with(SINGLE_WEIGHTS));
        assert!(source.listings.borrow().is_empty());
    }

    #[test]
    fn warm_cache_resolves_sharded_weights_offline() {
        let dir = TempDir::new().expect("create temp dir");
        let index = r#"{
            "weight_map": {
                "wte.weight": "model-00002-of-00002.safetensors",
                "h.0.ln_1.weight": "model-00001-of-00002.safetensors"
            }
        }"#;
        warm_cache(
            dir.path(),
            "org/tiny-gpt2",
            &[
                (WEIGHTS_INDEX, index),
                ("model-00001-of-00002.safetensors", ""),
                ("model-00002-of-00002.safetensors", ""),
            ],
        );
        let source = HubSource::new(Some(dir.path()), "main").unwrap();
        let id = CheckpointId::parse("org/tiny-gpt2").unwrap();

        let weights = source.weight_files(&id).unwrap();

        assert_eq!(weights.len(), 2);
        assert!(weights[0].ends_with("model-00001-of-00002.safetensors"));
        assert!(weights[1].ends_with("model-00002-of-00002.safetensors"));
        assert!(source.listings.borrow().is_empty());
    }

    #[test]
    fn shard_names_are_unique_and_sorted() {
        let index = r#"{
            "metadata": {"total_size": 10},
            "weight_map": {
                "wte.weight": "model-00002-of-00002.safetensors",
                "h.0.ln_1.weight": "model-00001-of-00002.safetensors",
                "h.0.ln_1.bias": "model-00001-of-00002.safetensors"
            }
        }"#;
        assert_eq!(
            shard_names(index).unwrap(),
            vec![
                "model-00001-of-00002.safetensors".to_string(),
                "model-00002-of-00002.safetensors".to_string(),
            ]
        );
    }
}
