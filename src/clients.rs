//! Command-backed artifact clients
//!
//! - `ModelRegistryClient` pulls models with `ollama pull` and confirms them
//!   against `ollama list`
//! - `FileArtifactClient` downloads files with `curl` into an artifact
//!   directory; a file is present once it exists and is non-empty

use crate::command_runner::run_command_safe;
use crate::commands::fetch::FetchUrlArgs;
use crate::commands::models::{listing_contains, ListModelsArgs, PullModelArgs};
use crate::download::ArtifactClient;
use crate::error::{ProvisionError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default)]
pub struct ModelRegistryClient;

impl ArtifactClient for ModelRegistryClient {
    fn fetch(&self, artifact_id: &str) -> Result<()> {
        let args = PullModelArgs {
            model: artifact_id.to_string(),
        };
        run_command_safe(&args)?.ensure_success(&format!("ollama pull {}", artifact_id))?;
        Ok(())
    }

    fn is_present(&self, artifact_id: &str) -> bool {
        match run_command_safe(&ListModelsArgs) {
            Ok(output) if output.success => listing_contains(&output.stdout, artifact_id),
            Ok(output) => {
                tracing::debug!("ollama list failed: {}", output.stderr.trim());
                false
            }
            Err(e) => {
                tracing::debug!("ollama list could not run: {}", e);
                false
            }
        }
    }
}

/// Downloads URL artifacts into one directory.
///
/// Artifact ids are file names inside `artifact_dir`; each id must have a
/// registered source URL.
#[derive(Debug, Clone)]
pub struct FileArtifactClient {
    artifact_dir: PathBuf,
    sources: BTreeMap<String, String>,
}

impl FileArtifactClient {
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifact_dir: artifact_dir.into(),
            sources: BTreeMap::new(),
        }
    }

    /// Register the URL for an artifact id
    pub fn with_source(mut self, artifact_id: impl Into<String>, url: impl Into<String>) -> Self {
        self.sources.insert(artifact_id.into(), url.into());
        self
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    pub fn path_for(&self, artifact_id: &str) -> PathBuf {
        self.artifact_dir.join(artifact_id)
    }
}

impl ArtifactClient for FileArtifactClient {
    fn fetch(&self, artifact_id: &str) -> Result<()> {
        let url = self.sources.get(artifact_id).ok_or_else(|| {
            ProvisionError::command(format!("no source URL registered for '{}'", artifact_id))
        })?;
        fs::create_dir_all(&self.artifact_dir)?;
        let args = FetchUrlArgs {
            url: url.clone(),
            destination: self.path_for(artifact_id),
        };
        run_command_safe(&args)?.ensure_success(&format!("download of {}", artifact_id))?;
        Ok(())
    }

    fn is_present(&self, artifact_id: &str) -> bool {
        fs::metadata(self.path_for(artifact_id))
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_presence_requires_non_empty_file() {
        let dir = tempdir().unwrap();
        let client = FileArtifactClient::new(dir.path());

        assert!(!client.is_present("corpus.zim"));

        fs::write(client.path_for("corpus.zim"), b"").unwrap();
        assert!(!client.is_present("corpus.zim"));

        fs::write(client.path_for("corpus.zim"), b"ZIM").unwrap();
        assert!(client.is_present("corpus.zim"));
    }

    #[test]
    fn test_unregistered_source_fails_without_spawning() {
        let dir = tempdir().unwrap();
        let client = FileArtifactClient::new(dir.path());
        let err = client.fetch("unknown.bin").unwrap_err();
        assert!(err.to_string().contains("no source URL"));
    }
}
