mod env;
mod types;

use std::path::Path;

use anyhow::{Context, bail};

pub use types::*;

use crate::rag::RagSettings;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings that would make indexing or generation fail later.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.models.embedding_repo.trim().is_empty() {
            bail!("models.embedding_repo must not be empty");
        }
        if self.models.generation_repo.trim().is_empty() {
            bail!("models.generation_repo must not be empty");
        }
        if self.models.embed_max_tokens == 0 {
            bail!("models.embed_max_tokens must be greater than zero");
        }
        if self.documents.max_file_size == 0 {
            bail!("documents.max_file_size must be greater than zero");
        }
        RagSettings::from(self).validate()?;
        Ok(())
    }
}
