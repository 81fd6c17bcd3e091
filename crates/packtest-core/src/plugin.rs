//! Adapter between a bundler's plugin lifecycle and the pipeline
//!
//! The host drives two calls per build:
//!
//! - [`TestPackagePlugin::render_start`] resolves the manifest of the
//!   package under test (loading it from disk unless supplied) and the
//!   override fragment.
//! - [`TestPackagePlugin::write_bundle`] reconciles, synthesizes and writes
//!   `package.json` into the resolved output directory.
//!
//! Failures never escape as errors: each is reported once through
//! [`Host::error`] and nothing is written afterwards.
//!
//! One plugin value serves one build at a time. Driving the same value
//! from concurrent builds is unsupported and unsynchronized.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tracing::{info, warn};
use uuid::Uuid;

use crate::bundle::BuildOutput;
use crate::deferred::Deferred;
use crate::error::{PackTestError, Result};
use crate::loader::load_source_manifest;
use crate::manifest::{DerivedManifest, OverrideManifest, SourceManifest, MANIFEST_FILE};
use crate::pipeline::{generate_from_bundle, GenerateOptions};
use crate::reconcile::ConflictScope;
use crate::writer::{FsJsonWriter, JsonWriter};

pub const PLUGIN_NAME: &str = "generate-test-package";

/// Default prefix of generated temporary output directories.
pub const TEMP_DIR_PREFIX: &str = "test-package";

/// The host's error-reporting channel.
pub trait Host {
    fn error(&mut self, message: String);
    fn warn(&mut self, message: String);
}

/// A host that keeps every reported message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(String::as_str)
    }
}

impl Host for Diagnostics {
    fn error(&mut self, message: String) {
        self.errors.push(message);
    }

    fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }
}

/// Output location hints handed over by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputOptions {
    pub dir: Option<PathBuf>,
    pub file: Option<PathBuf>,
}

impl OutputOptions {
    pub fn dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            file: None,
        }
    }

    pub fn file(file: impl Into<PathBuf>) -> Self {
        Self {
            dir: None,
            file: Some(file.into()),
        }
    }

    /// `explicit` > `dir` > directory portion of `file`.
    pub fn resolve_dir(&self, explicit: Option<&Path>) -> Option<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| self.dir.clone())
            .or_else(|| {
                self.file
                    .as_deref()
                    .and_then(Path::parent)
                    .map(Path::to_path_buf)
            })
    }

    /// Without any location hint, allocate and create a fresh temporary
    /// directory and use it as `dir`.
    pub async fn or_temp_dir(self, prefix: &str) -> Result<Self> {
        if self.dir.is_some() || self.file.is_some() {
            return Ok(self);
        }
        let dir = make_temp_path(prefix);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| PackTestError::Write {
                path: dir.clone(),
                source,
            })?;
        info!("Writing test package to {}", dir.display());
        Ok(Self::dir(dir))
    }
}

/// `<tmp>/<prefix>-<yyyy-MM-dd-HH-mm>-<slug>`; the slug keeps paths made
/// within the same minute apart. No colons, so the path is safe to pass on
/// package-manager command lines.
pub fn make_temp_path(prefix: &str) -> PathBuf {
    let time_part = Local::now().format("%Y-%m-%d-%H-%M");
    let id = Uuid::now_v7().simple().to_string();
    let slug = &id[id.len() - 10..];
    std::env::temp_dir().join(format!("{}-{}-{}", prefix, time_part, slug))
}

/// Recognized plugin options.
pub struct PluginOptions {
    /// Where to start looking for the manifest. Ignored when
    /// `package_json` is supplied.
    pub root_dir: Option<PathBuf>,
    pub package_json: Option<Deferred<SourceManifest>>,
    pub test_package_json: Deferred<OverrideManifest>,
    /// Overrides every output hint from the host.
    pub output_dir: Option<PathBuf>,
    pub generate: GenerateOptions,
    pub json_writer: Arc<dyn JsonWriter>,
}

impl Default for PluginOptions {
    fn default() -> Self {
        Self {
            root_dir: None,
            package_json: None,
            test_package_json: Deferred::default(),
            output_dir: None,
            generate: GenerateOptions::default(),
            json_writer: Arc::new(FsJsonWriter),
        }
    }
}

impl PluginOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(root_dir.into());
        self
    }

    pub fn with_package_json(mut self, package_json: impl Into<Deferred<SourceManifest>>) -> Self {
        self.package_json = Some(package_json.into());
        self
    }

    pub fn with_test_package_json(
        mut self,
        test_package_json: impl Into<Deferred<OverrideManifest>>,
    ) -> Self {
        self.test_package_json = test_package_json.into();
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    pub fn with_semver_conflict_check(mut self, enabled: bool) -> Self {
        self.generate.check_semver_conflicts = enabled;
        self
    }

    pub fn with_conflict_scope(mut self, scope: ConflictScope) -> Self {
        self.generate.conflict_scope = scope;
        self
    }

    pub fn with_dynamic_imports(mut self, enabled: bool) -> Self {
        self.generate.include_dynamic_imports = enabled;
        self
    }

    pub fn with_json_writer(mut self, writer: Arc<dyn JsonWriter>) -> Self {
        self.json_writer = writer;
        self
    }
}

/// What a successful run wrote, and where.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedManifest {
    pub path: PathBuf,
    pub manifest: DerivedManifest,
}

struct ResolvedInputs {
    source: SourceManifest,
    overrides: OverrideManifest,
}

enum InputState {
    Unresolved,
    Resolved(ResolvedInputs),
    /// Already reported through `Host::error`.
    Failed,
}

pub struct TestPackagePlugin {
    root_dir: Option<PathBuf>,
    package_json: Option<Deferred<SourceManifest>>,
    test_package_json: Option<Deferred<OverrideManifest>>,
    output_dir: Option<PathBuf>,
    generate: GenerateOptions,
    json_writer: Arc<dyn JsonWriter>,
    inputs: InputState,
}

impl TestPackagePlugin {
    pub fn new(options: PluginOptions) -> Self {
        Self {
            root_dir: options.root_dir,
            package_json: options.package_json,
            test_package_json: Some(options.test_package_json),
            output_dir: options.output_dir,
            generate: options.generate,
            json_writer: options.json_writer,
            inputs: InputState::Unresolved,
        }
    }

    pub fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    /// Resolve both input manifests, once. Returns the manifest of the
    /// package under test, or `None` once resolution has failed. The
    /// failure is reported on the first call only.
    pub async fn render_start(&mut self, host: &mut dyn Host) -> Option<&SourceManifest> {
        if let InputState::Unresolved = self.inputs {
            self.inputs = match self.resolve_inputs().await {
                Ok(inputs) => InputState::Resolved(inputs),
                Err(err) => {
                    host.error(err.to_string());
                    InputState::Failed
                }
            };
        }
        match &self.inputs {
            InputState::Resolved(inputs) => Some(&inputs.source),
            InputState::Unresolved | InputState::Failed => None,
        }
    }

    async fn resolve_inputs(&mut self) -> Result<ResolvedInputs> {
        let source = match self.package_json.take() {
            Some(deferred) => deferred.resolve().await,
            None => load_source_manifest(self.root_dir.as_deref()).await?,
        };
        let overrides = match self.test_package_json.take() {
            Some(deferred) => deferred.resolve().await,
            None => OverrideManifest::default(),
        };
        Ok(ResolvedInputs { source, overrides })
    }

    /// Generate and write `package.json` for one finished build.
    pub async fn write_bundle(
        &mut self,
        host: &mut dyn Host,
        output: &OutputOptions,
        bundle: &BuildOutput,
    ) -> Option<GeneratedManifest> {
        self.render_start(host).await?;
        let InputState::Resolved(inputs) = &self.inputs else {
            return None;
        };

        match self.write(inputs, output, bundle, host).await {
            Ok(generated) => Some(generated),
            Err(err) => {
                host.error(err.to_string());
                None
            }
        }
    }

    async fn write(
        &self,
        inputs: &ResolvedInputs,
        output: &OutputOptions,
        bundle: &BuildOutput,
        host: &mut dyn Host,
    ) -> Result<GeneratedManifest> {
        let manifest = generate_from_bundle(&inputs.source, &inputs.overrides, bundle, &self.generate)?;

        let unresolved = manifest.unresolved();
        if !unresolved.is_empty() {
            warn!("No version range declared for: {}", unresolved.join(", "));
            host.warn(format!(
                "{} does not declare a version range for: {}",
                inputs.source.name,
                unresolved.join(", ")
            ));
        }

        let dir = output.resolve_dir(self.output_dir.as_deref()).ok_or_else(|| {
            PackTestError::InvalidInput(
                "no output directory: set 'outputDir' or provide an output dir or file".to_string(),
            )
        })?;
        let path = dir.join(MANIFEST_FILE);
        let document = manifest
            .to_json()
            .map_err(|e| PackTestError::InvalidInput(e.to_string()))?;

        self.json_writer.write_json(&path, &document).await?;
        info!(
            "Generated {} with {} dependencies",
            path.display(),
            manifest.dependencies.len() - unresolved.len()
        );
        Ok(GeneratedManifest { path, manifest })
    }
}
