//! Build output description and external import collection

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Compiled output of one build, keyed by chunk identifier in bundle order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildOutput {
    pub chunks: IndexMap<String, OutputChunk>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputChunk {
    /// Non-code output; contributes nothing.
    Asset(AssetInfo),
    Chunk(CodeChunk),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// External modules imported statically, in source order.
    #[serde(default)]
    pub imports: Vec<String>,
    /// External modules referenced through `import()`.
    #[serde(default)]
    pub dynamic_imports: Vec<String>,
}

impl BuildOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk(mut self, id: impl Into<String>, imports: &[&str]) -> Self {
        self.chunks.insert(
            id.into(),
            OutputChunk::Chunk(CodeChunk {
                imports: imports.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }),
        );
        self
    }

    pub fn with_asset(mut self, id: impl Into<String>) -> Self {
        self.chunks
            .insert(id.into(), OutputChunk::Asset(AssetInfo::default()));
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, chunk: OutputChunk) {
        self.chunks.insert(id.into(), chunk);
    }

    pub fn code_chunks(&self) -> impl Iterator<Item = &CodeChunk> {
        self.chunks.values().filter_map(|chunk| match chunk {
            OutputChunk::Chunk(code) => Some(code),
            OutputChunk::Asset(_) => None,
        })
    }

    /// Flat list of external module names, duplicates kept.
    ///
    /// A chunk's dynamic imports follow its static ones when
    /// `include_dynamic` is set.
    pub fn collect_imports(&self, include_dynamic: bool) -> Vec<String> {
        let mut names = Vec::new();
        for chunk in self.code_chunks() {
            names.extend(chunk.imports.iter().cloned());
            if include_dynamic {
                names.extend(chunk.dynamic_imports.iter().cloned());
            }
        }
        names
    }
}
