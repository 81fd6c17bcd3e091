//! Sinks for the derived manifest document

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use crate::error::{PackTestError, Result};

/// Receives the target path and the JSON document to store there.
#[async_trait]
pub trait JsonWriter: Send + Sync {
    async fn write_json(&self, path: &Path, document: &Value) -> Result<()>;
}

/// Writes pretty-printed JSON (2-space indent, trailing newline),
/// creating the parent directory when missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsJsonWriter;

#[async_trait]
impl JsonWriter for FsJsonWriter {
    async fn write_json(&self, path: &Path, document: &Value) -> Result<()> {
        let write_error = |source: std::io::Error| PackTestError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut content = serde_json::to_string_pretty(document)
            .map_err(|e| write_error(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        content.push('\n');

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
        }
        tokio::fs::write(path, content).await.map_err(write_error)
    }
}
