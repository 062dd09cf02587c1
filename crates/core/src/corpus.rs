// Prompt corpus
//
// Loaded once before scheduling starts and shared read-only (Arc<Corpus>)
// by every attempt, so no locking is needed.

use rand::Rng;
use std::path::Path;

use crate::config::{PromptSource, RunConfig};
use crate::error::CorpusError;

/// Ordered, read-only set of candidate prompt texts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    prompts: Vec<String>,
}

impl Corpus {
    /// An empty corpus (used in `random` prompt mode)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(prompts: Vec<String>) -> Self {
        Self { prompts }
    }

    /// Load a JSON array of strings from `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CorpusError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let prompts: Vec<String> =
            serde_json::from_str(&raw).map_err(|source| CorpusError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::info!(path = %path.display(), prompts = prompts.len(), "Loaded prompt corpus");
        Ok(Self { prompts })
    }

    /// The corpus a run needs: loaded from `<results_dir>/prompts.json` in
    /// corpus mode, empty otherwise. A missing or malformed file is an error.
    pub fn for_config(config: &RunConfig) -> Result<Self, CorpusError> {
        match config.prompt_source {
            PromptSource::Random => Ok(Self::empty()),
            PromptSource::Corpus => {
                let corpus = Self::load(config.corpus_path())?;
                if corpus.is_empty() {
                    tracing::warn!("Prompt corpus is empty, falling back to filler prompts");
                }
                Ok(corpus)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Pick one entry uniformly at random
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        if self.prompts.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..self.prompts.len());
        Some(self.prompts[idx].as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.prompts.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;

    #[test]
    fn test_load_json_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["def add(a, b):", "fn main() {{}}"]"#).unwrap();

        let corpus = Corpus::load(file.path()).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(
            corpus.iter().collect::<Vec<_>>(),
            vec!["def add(a, b):", "fn main() {}"]
        );
    }

    #[test]
    fn test_load_rejects_non_string_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"prompts": [1, 2]}}"#).unwrap();

        let err = Corpus::load(file.path()).unwrap_err();
        assert!(matches!(err, CorpusError::Parse { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Corpus::load(dir.path().join("prompts.json")).unwrap_err();
        assert!(matches!(err, CorpusError::Io { .. }));
    }

    #[test]
    fn test_for_config_reads_results_dir() {
        use crate::config::Target;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("prompts.json"), r#"["a", "b"]"#).unwrap();
        let config = RunConfig::new(
            "test-model",
            Target::direct("http://localhost:8000/v1/chat/completions"),
            Duration::from_secs(1),
        )
        .with_results_dir(dir.path());

        assert!(Corpus::for_config(&config).unwrap().is_empty());

        let config = config.with_prompt_source(PromptSource::Corpus);
        assert_eq!(Corpus::for_config(&config).unwrap().len(), 2);

        let config = config.with_results_dir(dir.path().join("missing"));
        assert!(Corpus::for_config(&config).is_err());
    }

    #[test]
    fn test_choose_covers_all_entries() {
        let corpus = Corpus::new(vec!["a".into(), "b".into(), "c".into()]);
        let mut rng = StdRng::seed_from_u64(3);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..300 {
            seen.insert(corpus.choose(&mut rng).unwrap().to_string());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_choose_on_empty() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(Corpus::empty().choose(&mut rng).is_none());
    }
}
