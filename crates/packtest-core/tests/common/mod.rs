//! Shared fixtures for the plugin integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use packtest_core::{
    BuildOutput, DependencyField, DependencySet, Diagnostics, JsonWriter, OutputOptions,
    OverrideManifest, PluginOptions, SourceManifest, TestPackagePlugin,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Stands in for the project's own package.json.
pub fn fake_package_json() -> SourceManifest {
    use DependencyField::*;
    SourceManifest::new("fake-package", "1.0.0-superfake")
        .with_dependency(Dependencies, "esm", "^3.2.25")
        .with_dependency(Dependencies, "lodash", "^1.23.2343")
        .with_dependency(Dependencies, "underscore", "^12.2.3")
        .with_dependency(Dependencies, "cuid", "^2.1.8")
        .with_dependency(DevDependencies, "zora", "^3.1.8")
        .with_dependency(DevDependencies, "npm-run-all", "^4.1.5")
        .with_dependency(DevDependencies, "tape", "^5.0.0")
}

/// Just enough build output for the plugin to operate on.
pub fn fake_bundles() -> BuildOutput {
    BuildOutput::new()
        .with_chunk("dep1", &["lodash", "underscore", "cuid"])
        // duplicate lodash, plus zora from devDependencies
        .with_chunk("dep2", &["lodash", "zora"])
        .with_chunk("dep3", &[])
        .with_asset("dep4")
}

/// What the plugin should compute for `bundles` without any override.
pub fn expected_dependencies(package_json: &SourceManifest, bundles: &BuildOutput) -> DependencySet {
    let mut ranges = package_json.dependencies.clone();
    ranges.extend(package_json.dev_dependencies.clone());
    ranges.extend(package_json.peer_dependencies.clone());

    let mut expected: DependencySet = bundles
        .code_chunks()
        .flat_map(|chunk| chunk.imports.iter())
        .map(|name| (name.clone(), ranges.get(name).cloned()))
        .collect();
    for (name, range) in &package_json.peer_dependencies {
        expected.insert(name.clone(), Some(range.clone()));
    }
    expected.insert(
        "fake-package".to_string(),
        Some("file:fake-package-1.0.0-superfake.tgz".to_string()),
    );
    expected
}

/// Captures the path and document instead of touching the filesystem.
#[derive(Clone, Default)]
pub struct RecordingWriter {
    written: Arc<Mutex<Option<(PathBuf, Value)>>>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.written
            .lock()
            .ok()
            .and_then(|w| w.as_ref().map(|(p, _)| p.clone()))
    }

    pub fn package_json(&self) -> Option<Value> {
        self.written
            .lock()
            .ok()
            .and_then(|w| w.as_ref().map(|(_, v)| v.clone()))
    }
}

#[async_trait]
impl JsonWriter for RecordingWriter {
    async fn write_json(&self, path: &Path, document: &Value) -> packtest_core::Result<()> {
        if let Ok(mut written) = self.written.lock() {
            *written = Some((path.to_path_buf(), document.clone()));
        }
        Ok(())
    }
}

/// Rejects every write the way a full disk would.
#[derive(Clone, Copy, Default)]
pub struct FailingWriter;

#[async_trait]
impl JsonWriter for FailingWriter {
    async fn write_json(&self, path: &Path, _document: &Value) -> packtest_core::Result<()> {
        Err(packtest_core::PackTestError::Write {
            path: path.to_path_buf(),
            source: std::io::Error::other("no space left on device"),
        })
    }
}

pub struct PluginRun {
    pub writer: RecordingWriter,
    pub diagnostics: Diagnostics,
}

impl PluginRun {
    pub fn error(&self) -> Option<&str> {
        self.diagnostics.first_error()
    }

    pub fn written(&self) -> Result<Value, Box<dyn std::error::Error>> {
        match self.writer.package_json() {
            Some(value) => Ok(value),
            None => Err(format!("nothing written, errors: {:?}", self.diagnostics.errors).into()),
        }
    }
}

/// Run the plugin the way a host would, with a recording writer.
pub async fn exercise_plugin(
    package_json: Option<SourceManifest>,
    test_package_json: Option<OverrideManifest>,
    options: PluginOptions,
) -> PluginRun {
    let writer = RecordingWriter::new();
    let mut options = options.with_json_writer(Arc::new(writer.clone()));
    if let Some(package_json) = package_json {
        options = options.with_package_json(package_json);
    }
    if let Some(test_package_json) = test_package_json {
        options = options.with_test_package_json(test_package_json);
    }

    let mut plugin = TestPackagePlugin::new(options);
    let mut diagnostics = Diagnostics::new();
    let started = plugin.render_start(&mut diagnostics).await.is_some();
    if started {
        plugin
            .write_bundle(
                &mut diagnostics,
                &OutputOptions::dir("do-not-care"),
                &fake_bundles(),
            )
            .await;
    }
    PluginRun {
        writer,
        diagnostics,
    }
}

pub fn fragment(value: Value) -> Result<OverrideManifest, serde_json::Error> {
    serde_json::from_value(value)
}
