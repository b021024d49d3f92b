use crate::data::{FileArtifact, PathRejection, validate_relative_path};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    InvalidPath(#[from] PathRejection),
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Writes artifacts under a target root, creating parent directories and
/// overwriting existing files in full.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    root: PathBuf,
}

impl ArtifactWriter {
    /// Creates a new ArtifactWriter
    ///
    /// # Arguments
    /// * `root` - Directory every artifact path is resolved against
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves a relative artifact path under the root.
    ///
    /// Backslash separators are accepted and normalized.
    pub fn target_path(&self, relative: &str) -> Result<PathBuf, PathRejection> {
        validate_relative_path(relative)?;
        let mut path = self.root.clone();
        for segment in relative.trim().split(['/', '\\']) {
            if !segment.is_empty() && segment != "." {
                path.push(segment);
            }
        }
        Ok(path)
    }

    /// Writes one artifact and returns where it landed.
    pub async fn write(&self, artifact: &FileArtifact) -> Result<PathBuf, WriteError> {
        let path = self.target_path(&artifact.relative_path)?;

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| WriteError::CreateDir {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(&path, &artifact.content)
            .await
            .map_err(|source| WriteError::Write {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(path = %path.display(), bytes = artifact.content.len(), "wrote artifact");
        Ok(path)
    }
}
