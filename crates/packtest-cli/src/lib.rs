//! Library interface for the packtest CLI

use anyhow::{Context, Result};
use async_trait::async_trait;
use packtest_core::{
    BuildOutput, ConflictScope, Diagnostics, GeneratedManifest, JsonWriter, OutputOptions,
    OverrideManifest, PluginOptions, SourceManifest, TestPackagePlugin,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything one `generate` invocation needs.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub bundle: PathBuf,
    pub root_dir: Option<PathBuf>,
    pub package_json: Option<PathBuf>,
    pub test_package_json: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    pub check_semver_conflicts: bool,
    pub conflict_scope: ConflictScope,
    pub dynamic_imports: bool,
    pub temp_prefix: String,
    /// Print the document instead of writing it.
    pub print: bool,
}

/// Prints the document to stdout instead of writing `package.json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutJsonWriter;

#[async_trait]
impl JsonWriter for StdoutJsonWriter {
    async fn write_json(&self, path: &Path, document: &Value) -> packtest_core::Result<()> {
        let content = serde_json::to_string_pretty(document)
            .map_err(|e| packtest_core::PackTestError::InvalidInput(e.to_string()))?;
        info!("Would write {}", path.display());
        println!("{}", content);
        Ok(())
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {} from {}", what, path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {} from {}", what, path.display()))
}

pub async fn handle_generate(request: GenerateRequest) -> Result<GeneratedManifest> {
    let bundle: BuildOutput = read_json(&request.bundle, "bundle description").await?;

    let mut options = PluginOptions::new()
        .with_semver_conflict_check(request.check_semver_conflicts)
        .with_conflict_scope(request.conflict_scope)
        .with_dynamic_imports(request.dynamic_imports);
    if let Some(root_dir) = &request.root_dir {
        options = options.with_root_dir(root_dir);
    }
    if let Some(path) = &request.package_json {
        let source: SourceManifest = read_json(path, "package manifest").await?;
        options = options.with_package_json(source);
    }
    if let Some(path) = &request.test_package_json {
        let overrides: OverrideManifest = read_json(path, "test package fragment").await?;
        options = options.with_test_package_json(overrides);
    }
    if let Some(output_dir) = &request.output_dir {
        options = options.with_output_dir(output_dir);
    }
    if request.print {
        options = options.with_json_writer(Arc::new(StdoutJsonWriter));
    }

    let hints = OutputOptions {
        dir: None,
        file: request.output_file.clone(),
    };
    let hints = match (&request.output_dir, request.print) {
        (Some(_), _) => hints,
        (None, false) => hints.or_temp_dir(&request.temp_prefix).await?,
        (None, true) if hints.file.is_none() => OutputOptions::dir("."),
        (None, true) => hints,
    };

    let mut plugin = TestPackagePlugin::new(options);
    let mut diagnostics = Diagnostics::new();
    let generated = plugin.write_bundle(&mut diagnostics, &hints, &bundle).await;

    for warning in &diagnostics.warnings {
        warn!("{}", warning);
    }
    match generated {
        Some(generated) if !diagnostics.has_errors() => Ok(generated),
        _ => anyhow::bail!("{}", diagnostics.errors.join("\n")),
    }
}
