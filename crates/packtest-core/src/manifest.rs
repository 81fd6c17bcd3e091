//! Package manifest documents
//!
//! Three shapes of the same JSON format flow through a run:
//! - [`SourceManifest`]: the library under test, authoritative for ranges
//! - [`OverrideManifest`]: a caller-supplied partial fragment
//! - [`DerivedManifest`]: the synthesized smoke-test manifest

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Module name -> declared range.
pub type DependencyMap = BTreeMap<String, String>;

/// Module name -> resolved range; `None` when the name could not be resolved.
pub type DependencySet = BTreeMap<String, Option<String>>;

/// The well-known manifest filename.
pub const MANIFEST_FILE: &str = "package.json";

/// The three dependency fields of a manifest, in increasing lookup precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencyField {
    Dependencies,
    DevDependencies,
    PeerDependencies,
}

impl DependencyField {
    pub const ALL: [DependencyField; 3] = [
        DependencyField::Dependencies,
        DependencyField::DevDependencies,
        DependencyField::PeerDependencies,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            DependencyField::Dependencies => "dependencies",
            DependencyField::DevDependencies => "devDependencies",
            DependencyField::PeerDependencies => "peerDependencies",
        }
    }
}

impl fmt::Display for DependencyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceManifest {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: DependencyMap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dev_dependencies: DependencyMap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub peer_dependencies: DependencyMap,
    /// Every other field of the file, kept so the record round-trips.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SourceManifest {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            dependencies: DependencyMap::new(),
            dev_dependencies: DependencyMap::new(),
            peer_dependencies: DependencyMap::new(),
            extra: Map::new(),
        }
    }

    pub fn with_dependency(
        mut self,
        field: DependencyField,
        name: impl Into<String>,
        range: impl Into<String>,
    ) -> Self {
        self.field_mut(field).insert(name.into(), range.into());
        self
    }

    pub fn field(&self, field: DependencyField) -> &DependencyMap {
        match field {
            DependencyField::Dependencies => &self.dependencies,
            DependencyField::DevDependencies => &self.dev_dependencies,
            DependencyField::PeerDependencies => &self.peer_dependencies,
        }
    }

    fn field_mut(&mut self, field: DependencyField) -> &mut DependencyMap {
        match field {
            DependencyField::Dependencies => &mut self.dependencies,
            DependencyField::DevDependencies => &mut self.dev_dependencies,
            DependencyField::PeerDependencies => &mut self.peer_dependencies,
        }
    }

    /// Dependency string pointing at the packed artifact of this package,
    /// e.g. `@scope/pkg` 1.0.0 -> `file:scope-pkg-1.0.0.tgz`.
    pub fn pack_file_dependency(&self) -> String {
        let name = self.name.strip_prefix('@').unwrap_or(&self.name);
        format!("file:{}-{}.tgz", name.replace('/', "-"), self.version)
    }
}

/// Partial manifest supplied by the caller. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripts: Option<BTreeMap<String, String>>,
    /// A string or a `{ name, email, url }` object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<DependencyMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_dependencies: Option<DependencyMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_dependencies: Option<DependencyMap>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OverrideManifest {
    pub fn field(&self, field: DependencyField) -> Option<&DependencyMap> {
        match field {
            DependencyField::Dependencies => self.dependencies.as_ref(),
            DependencyField::DevDependencies => self.dev_dependencies.as_ref(),
            DependencyField::PeerDependencies => self.peer_dependencies.as_ref(),
        }
    }

    /// The first dependency field that places `name`, with its range.
    pub fn claim(&self, name: &str) -> Option<(DependencyField, &str)> {
        DependencyField::ALL.iter().find_map(|field| {
            self.field(*field)
                .and_then(|deps| deps.get(name))
                .map(|range| (*field, range.as_str()))
        })
    }

    pub fn claims(&self, name: &str) -> bool {
        self.claim(name).is_some()
    }
}

/// The synthesized smoke-test manifest, serialized in field order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedManifest {
    pub name: String,
    pub version: String,
    pub description: String,
    pub main: String,
    pub scripts: BTreeMap<String, String>,
    pub author: Value,
    #[serde(serialize_with = "serialize_resolved")]
    pub dependencies: DependencySet,
    pub dev_dependencies: DependencyMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_dependencies: Option<DependencyMap>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DerivedManifest {
    /// Names whose range could not be resolved from the source manifest.
    pub fn unresolved(&self) -> Vec<&str> {
        self.dependencies
            .iter()
            .filter(|(_, range)| range.is_none())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

// Unresolved entries are dropped from the document, not written as null.
fn serialize_resolved<S>(set: &DependencySet, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(
        set.iter()
            .filter_map(|(name, range)| range.as_ref().map(|range| (name, range))),
    )
}
