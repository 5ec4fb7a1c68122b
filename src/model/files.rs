use anyhow::{Context, Result};
use glob::glob;
use std::path::{Path, PathBuf};

/// Files making up a checkpoint stored in a local directory.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub weights: Vec<PathBuf>,
    pub config: PathBuf,
    pub tokenizer_json: Option<PathBuf>,
}

impl ModelFiles {
    pub fn from_directory<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();

        let pattern = dir.join("*.safetensors");
        let pattern = pattern
            .to_str()
            .with_context(|| format!("non UTF-8 checkpoint path {:?}", dir))?;
        let mut weights = glob(pattern)?
            .filter_map(|entry| entry.ok())
            .collect::<Vec<_>>();
        weights.sort();
        if weights.is_empty() {
            anyhow::bail!("no .safetensors file found in {:?}", dir);
        }

        let config = Self::find_file(dir, "config.json")
            .with_context(|| format!("config.json not found in {:?}", dir))?;

        Ok(Self {
            weights,
            config,
            tokenizer_json: Self::find_file(dir, "tokenizer.json"),
        })
    }

    fn find_file(dir: &Path, filename: &str) -> Option<PathBuf> {
        let path = dir.join(filename);
        path.exists().then_some(path)
    }
}
