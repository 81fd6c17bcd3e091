//! Typed overlay merging for manifest fragments
//!
//! # Merge Semantics
//!
//! - **Scalars** (`String`, JSON values): the overlay replaces the base
//! - **`Option<T>`**: `None` keeps the base, two `Some`s merge recursively
//! - **Maps**: entries merge key by key, overlay entries winning on collision
//!
//! Per-field rules for [`OverrideManifest`]:
//!
//! | field              | rule                         |
//! |--------------------|------------------------------|
//! | `name` .. `main`   | overlay replaces base        |
//! | `author`           | overlay replaces base        |
//! | `scripts`          | key-wise, overlay wins       |
//! | dependency fields  | key-wise, overlay wins       |
//! | extra fields       | key-wise, overlay replaces   |

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::manifest::OverrideManifest;

pub trait Merge: Sized {
    /// Merge `other` into `self`, with `other` taking precedence.
    fn merge(self, other: Self) -> Self;

    /// Merge multiple overlays in sequence; later overlays win.
    fn merge_all<I>(self, overlays: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        overlays.into_iter().fold(self, |acc, overlay| acc.merge(overlay))
    }
}

impl<T> Merge for Option<T>
where
    T: Merge,
{
    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Some(a), Some(b)) => Some(a.merge(b)),
            (a, b) => b.or(a),
        }
    }
}

impl<K, V> Merge for BTreeMap<K, V>
where
    K: Ord,
    V: Merge,
{
    fn merge(mut self, other: Self) -> Self {
        for (key, other_value) in other {
            let merged = match self.remove(&key) {
                Some(self_value) => self_value.merge(other_value),
                None => other_value,
            };
            self.insert(key, merged);
        }
        self
    }
}

impl Merge for String {
    fn merge(self, other: Self) -> Self {
        other
    }
}

impl Merge for Value {
    fn merge(self, other: Self) -> Self {
        other
    }
}

fn merge_extra(mut base: Map<String, Value>, overlay: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in overlay {
        base.insert(key, value);
    }
    base
}

impl Merge for OverrideManifest {
    fn merge(self, other: Self) -> Self {
        Self {
            name: self.name.merge(other.name),
            version: self.version.merge(other.version),
            description: self.description.merge(other.description),
            main: self.main.merge(other.main),
            scripts: self.scripts.merge(other.scripts),
            author: self.author.merge(other.author),
            dependencies: self.dependencies.merge(other.dependencies),
            dev_dependencies: self.dev_dependencies.merge(other.dev_dependencies),
            peer_dependencies: self.peer_dependencies.merge(other.peer_dependencies),
            extra: merge_extra(self.extra, other.extra),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_option_overlay_none_keeps_base() {
        let base = Some("index.js".to_string());
        assert_eq!(base.clone().merge(None), base);
        assert_eq!(
            base.merge(Some("main.mjs".to_string())),
            Some("main.mjs".to_string())
        );
    }

    #[test]
    fn test_maps_merge_key_wise() {
        let base: BTreeMap<String, String> = [("a", "1"), ("b", "2")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let overlay: BTreeMap<String, String> = [("b", "3"), ("c", "4")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let merged = base.merge(overlay);
        assert_eq!(merged["a"], "1");
        assert_eq!(merged["b"], "3");
        assert_eq!(merged["c"], "4");
    }

    #[test]
    fn test_fragment_merge_rules() -> Result<(), Box<dyn std::error::Error>> {
        let defaults: OverrideManifest = serde_json::from_value(json!({
            "name": "lib-package-test",
            "scripts": {},
            "author": "packtest",
            "private": true
        }))?;
        let overlay: OverrideManifest = serde_json::from_value(json!({
            "scripts": { "test": "node test.js" },
            "author": { "name": "Someone" },
            "private": false,
            "license": "MIT"
        }))?;

        let merged = defaults.merge_all([overlay]);
        assert_eq!(merged.name.as_deref(), Some("lib-package-test"));
        assert_eq!(
            merged.scripts.unwrap_or_default().get("test").map(String::as_str),
            Some("node test.js")
        );
        assert_eq!(merged.author, Some(json!({ "name": "Someone" })));
        assert_eq!(merged.extra["private"], json!(false));
        assert_eq!(merged.extra["license"], json!("MIT"));
        Ok(())
    }
}
