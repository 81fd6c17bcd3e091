//! The pure reconcile-then-synthesize pipeline

use tracing::debug;

use crate::bundle::BuildOutput;
use crate::error::Result;
use crate::manifest::{DerivedManifest, OverrideManifest, SourceManifest};
use crate::reconcile::{ConflictScope, ReconcileOptions, Reconciler};
use crate::synthesize::synthesize;

/// Knobs of a single generation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Fail when an override range cannot be satisfied together with the
    /// range the package under test declares.
    pub check_semver_conflicts: bool,
    pub conflict_scope: ConflictScope,
    /// Count `import()` references as used modules.
    pub include_dynamic_imports: bool,
}

impl GenerateOptions {
    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            check_semver_conflicts: self.check_semver_conflicts,
            conflict_scope: self.conflict_scope,
        }
    }
}

/// Derive the smoke-test manifest from already collected module names.
///
/// No I/O happens here; identical inputs give identical output.
pub fn generate(
    source: &SourceManifest,
    overrides: &OverrideManifest,
    used: &[String],
    options: &GenerateOptions,
) -> Result<DerivedManifest> {
    let reconciler = Reconciler::new(source, overrides, options.reconcile_options());
    debug!(
        "Reconciling {} used modules against {} declared ranges",
        used.len(),
        reconciler.table().len()
    );
    let computed = reconciler.reconcile(used)?;
    Ok(synthesize(source, overrides, computed))
}

/// [`generate`] over the external imports of a build output.
pub fn generate_from_bundle(
    source: &SourceManifest,
    overrides: &OverrideManifest,
    bundle: &BuildOutput,
    options: &GenerateOptions,
) -> Result<DerivedManifest> {
    let used = bundle.collect_imports(options.include_dynamic_imports);
    generate(source, overrides, &used, options)
}
