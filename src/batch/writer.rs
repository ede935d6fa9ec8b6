//! Write-back of processed outputs

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WriteBackError {
    #[error("invalid output name '{0}'")]
    InvalidName(String),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Destination for completed outputs
#[async_trait]
pub trait Writer: Send + Sync {
    /// Persist `bytes` under `name` (a bare file name, no directories)
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<(), WriteBackError>;
}

/// Writes outputs as files in one directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectoryWriter {
    dir: PathBuf,
}

impl DirectoryWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn target(&self, name: &str) -> Result<PathBuf, WriteBackError> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.contains('\0');
        if !valid {
            return Err(WriteBackError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(name))
    }
}

#[async_trait]
impl Writer for DirectoryWriter {
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<(), WriteBackError> {
        let path = self.target(name)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| WriteBackError::Io {
                path: self.dir.clone(),
                source,
            })?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| WriteBackError::Io {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "output written");
        Ok(())
    }
}
