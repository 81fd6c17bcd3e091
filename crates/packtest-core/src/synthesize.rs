//! Assemble the derived smoke-test manifest

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::manifest::{
    DependencyField, DependencyMap, DependencySet, DerivedManifest, OverrideManifest,
    SourceManifest,
};
use crate::merge::Merge;

/// Written as the default `author` of every derived manifest.
pub const SYNTHESIZER_IDENTITY: &str = "packtest";

/// Defaults that any override field replaces.
pub fn defaults(source: &SourceManifest) -> OverrideManifest {
    OverrideManifest {
        name: Some(format!("{}-package-test", source.name)),
        version: Some("1.0.0".to_string()),
        description: Some(format!("Generated package test for {}", source.name)),
        main: Some("index.js".to_string()),
        scripts: Some(BTreeMap::new()),
        author: Some(Value::String(SYNTHESIZER_IDENTITY.to_string())),
        dependencies: None,
        dev_dependencies: Some(DependencyMap::new()),
        peer_dependencies: None,
        extra: Map::new(),
    }
}

/// Build the derived manifest from reconciled dependencies.
///
/// `computed` must already exclude the names the override places itself.
/// The final `dependencies` are `computed`, then the packed-artifact
/// reference to the package under test, then the override's own
/// `dependencies`, later entries winning.
pub fn synthesize(
    source: &SourceManifest,
    overrides: &OverrideManifest,
    computed: DependencySet,
) -> DerivedManifest {
    let own_dependencies = overrides.dependencies.clone();
    let fragment = OverrideManifest {
        dependencies: None,
        ..overrides.clone()
    };
    let merged = defaults(source).merge(fragment);

    let mut dependencies = computed;
    let self_placed_elsewhere = [
        DependencyField::DevDependencies,
        DependencyField::PeerDependencies,
    ]
    .iter()
    .any(|field| {
        overrides
            .field(*field)
            .is_some_and(|deps| deps.contains_key(&source.name))
    });
    if !self_placed_elsewhere {
        dependencies.insert(source.name.clone(), Some(source.pack_file_dependency()));
    }
    for (name, range) in own_dependencies.unwrap_or_default() {
        dependencies.insert(name, Some(range));
    }

    DerivedManifest {
        name: merged.name.unwrap_or_default(),
        version: merged.version.unwrap_or_default(),
        description: merged.description.unwrap_or_default(),
        main: merged.main.unwrap_or_default(),
        scripts: merged.scripts.unwrap_or_default(),
        author: merged.author.unwrap_or(Value::Null),
        dependencies,
        dev_dependencies: merged.dev_dependencies.unwrap_or_default(),
        peer_dependencies: merged.peer_dependencies,
        extra: merged.extra,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn source() -> SourceManifest {
        SourceManifest::new("fake-package", "1.0.0-superfake")
    }

    #[test]
    fn test_defaults() {
        let derived = synthesize(&source(), &OverrideManifest::default(), DependencySet::new());
        assert_eq!(derived.name, "fake-package-package-test");
        assert_eq!(derived.version, "1.0.0");
        assert_eq!(derived.description, "Generated package test for fake-package");
        assert_eq!(derived.main, "index.js");
        assert!(derived.scripts.is_empty());
        assert_eq!(derived.author, json!(SYNTHESIZER_IDENTITY));
        assert!(derived.dev_dependencies.is_empty());
        assert_eq!(derived.peer_dependencies, None);
        assert_eq!(
            derived.dependencies["fake-package"].as_deref(),
            Some("file:fake-package-1.0.0-superfake.tgz")
        );
    }

    #[test]
    fn test_override_dependencies_win() -> Result<(), Box<dyn std::error::Error>> {
        let overrides: OverrideManifest = serde_json::from_value(json!({
            "dependencies": { "lodash": "^4.0.0", "fake-package": "file:custom.tgz" },
            "devDependencies": { "tape": "^5.0.1" },
            "peerDependencies": { "react": "^18.0.0" }
        }))?;
        let mut computed = DependencySet::new();
        computed.insert("lodash".to_string(), Some("^1.0.0".to_string()));
        computed.insert("cuid".to_string(), Some("^2.1.8".to_string()));

        let derived = synthesize(&source(), &overrides, computed);
        assert_eq!(derived.dependencies["lodash"].as_deref(), Some("^4.0.0"));
        assert_eq!(derived.dependencies["cuid"].as_deref(), Some("^2.1.8"));
        assert_eq!(
            derived.dependencies["fake-package"].as_deref(),
            Some("file:custom.tgz")
        );
        assert_eq!(derived.dev_dependencies["tape"], "^5.0.1");
        assert_eq!(
            derived.peer_dependencies.as_ref().map(|p| p["react"].as_str()),
            Some("^18.0.0")
        );
        Ok(())
    }

    #[test]
    fn test_self_reference_yields_to_override_placement() -> Result<(), Box<dyn std::error::Error>> {
        let overrides: OverrideManifest = serde_json::from_value(json!({
            "devDependencies": { "fake-package": "file:../fake-package.tgz" }
        }))?;
        let derived = synthesize(&source(), &overrides, DependencySet::new());
        assert!(!derived.dependencies.contains_key("fake-package"));
        assert_eq!(derived.dev_dependencies["fake-package"], "file:../fake-package.tgz");
        Ok(())
    }
}
