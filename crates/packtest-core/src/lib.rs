//! Manifest synthesis for packed-artifact smoke tests
//!
//! Given the manifest of a library and the external modules its build
//! output imports, derive the `package.json` of a small test package that
//! depends on the library's packed artifact and pins every other
//! dependency to the range the library itself declares.
//!
//! The pipeline runs once per build:
//!
//! - [`loader`] finds and parses the library manifest
//! - [`bundle`] collects external imports from the build output
//! - [`reconcile`] maps imports to ranges and settles them against overrides
//! - [`synthesize`] assembles the derived manifest
//! - [`plugin`] wires the above to a host build tool and a [`JsonWriter`]
//!
//! # Example
//!
//! ```rust
//! use packtest_core::{generate, BuildOutput, DependencyField, GenerateOptions, OverrideManifest, SourceManifest};
//!
//! let source = SourceManifest::new("fake-package", "1.0.0")
//!     .with_dependency(DependencyField::Dependencies, "lodash", "^4.17.21");
//! let bundle = BuildOutput::new().with_chunk("index.js", &["lodash"]);
//! let used = bundle.collect_imports(false);
//!
//! let derived = generate(&source, &OverrideManifest::default(), &used, &GenerateOptions::default()).unwrap();
//! assert_eq!(derived.dependencies["lodash"].as_deref(), Some("^4.17.21"));
//! assert_eq!(derived.dependencies["fake-package"].as_deref(), Some("file:fake-package-1.0.0.tgz"));
//! ```

pub mod bundle;
pub mod deferred;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod merge;
pub mod pipeline;
pub mod plugin;
pub mod range;
pub mod reconcile;
pub mod synthesize;
pub mod writer;

pub use bundle::{BuildOutput, CodeChunk, OutputChunk};
pub use deferred::Deferred;
pub use error::{ConflictError, ConflictRecord, PackTestError, Result, CONFLICT_PREFIX};
pub use loader::{find_package_root, load_source_manifest};
pub use manifest::{
    DependencyField, DependencyMap, DependencySet, DerivedManifest, OverrideManifest,
    SourceManifest, MANIFEST_FILE,
};
pub use merge::Merge;
pub use pipeline::{generate, generate_from_bundle, GenerateOptions};
pub use plugin::{
    Diagnostics, GeneratedManifest, Host, OutputOptions, PluginOptions, TestPackagePlugin,
};
pub use range::{ranges_intersect, VersionRange};
pub use reconcile::{reconcile, ConflictScope, ReconcileOptions, Reconciler};
pub use synthesize::{synthesize, SYNTHESIZER_IDENTITY};
pub use writer::{FsJsonWriter, JsonWriter};
