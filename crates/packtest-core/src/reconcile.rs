//! Dependency reconciliation
//!
//! Maps the external module names a bundle uses onto the ranges the
//! package under test declares, then settles them against the caller's
//! override fragment:
//!
//! 1. Overlay `dependencies`, `devDependencies`, `peerDependencies` (later wins)
//!    into one authoritative lookup table.
//! 2. Resolve every used name through the table. Unknown names resolve to
//!    `None` and are passed through.
//! 3. Union in every peer dependency, imported or not.
//! 4. Optionally fail on ranges that cannot be satisfied together with the
//!    override's range for the same name.
//! 5. Drop every name the override already places in one of its own
//!    dependency fields.

use tracing::{debug, warn};

use crate::error::{ConflictError, ConflictRecord};
use crate::manifest::{DependencyField, DependencyMap, DependencySet, OverrideManifest, SourceManifest};
use crate::range::ranges_intersect;

/// Which names are checked against the override's ranges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictScope {
    /// Only names in the computed dependency set.
    #[default]
    Computed,
    /// Computed names plus every name the source manifest declares.
    Declared,
}

impl std::str::FromStr for ConflictScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "computed" => Ok(ConflictScope::Computed),
            "declared" => Ok(ConflictScope::Declared),
            other => Err(format!(
                "unknown conflict scope '{}', expected 'computed' or 'declared'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub check_semver_conflicts: bool,
    pub conflict_scope: ConflictScope,
}

/// Reconciles used module names for one package under test.
pub struct Reconciler<'a> {
    source: &'a SourceManifest,
    overrides: &'a OverrideManifest,
    options: ReconcileOptions,
    table: DependencyMap,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        source: &'a SourceManifest,
        overrides: &'a OverrideManifest,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            source,
            overrides,
            options,
            table: authoritative_ranges(source),
        }
    }

    /// The overlaid lookup table of every range the source declares.
    pub fn table(&self) -> &DependencyMap {
        &self.table
    }

    /// Steps 2 and 3: used names plus all peers, before the override is applied.
    pub fn compute(&self, used: &[String]) -> DependencySet {
        let mut computed = DependencySet::new();
        for name in used {
            computed
                .entry(name.clone())
                .or_insert_with(|| self.table.get(name).cloned());
        }
        debug!(
            "Resolved {} used module names to {} entries",
            used.len(),
            computed.len()
        );

        for (name, range) in &self.source.peer_dependencies {
            let entry = computed.entry(name.clone()).or_insert(None);
            if entry.is_none() {
                *entry = Some(range.clone());
            }
        }

        for (name, range) in &computed {
            if range.is_none() {
                warn!(
                    "'{}' is imported but not declared by {}",
                    name, self.source.name
                );
            }
        }
        computed
    }

    /// Step 4: every name whose computed and override ranges are disjoint.
    pub fn conflicts(&self, computed: &DependencySet) -> Vec<ConflictRecord> {
        let mut candidates: Vec<(&str, &str)> = computed
            .iter()
            .filter_map(|(name, range)| range.as_deref().map(|range| (name.as_str(), range)))
            .collect();
        if self.options.conflict_scope == ConflictScope::Declared {
            candidates.extend(
                self.table
                    .iter()
                    .filter(|(name, _)| !computed.contains_key(name.as_str()))
                    .map(|(name, range)| (name.as_str(), range.as_str())),
            );
        }

        let mut conflicts = Vec::new();
        for (name, computed_range) in candidates {
            let clashing = DependencyField::ALL.iter().find_map(|field| {
                let override_range = self.overrides.field(*field)?.get(name)?;
                match ranges_intersect(computed_range, override_range) {
                    Ok(true) => None,
                    Ok(false) => Some(override_range.clone()),
                    Err(err) => {
                        debug!(
                            "Skipping conflict check for '{}' in {}: {}",
                            name, field, err
                        );
                        None
                    }
                }
            });
            if let Some(override_range) = clashing {
                conflicts.push(ConflictRecord {
                    module_name: name.to_string(),
                    ranges: [computed_range.to_string(), override_range],
                });
            }
        }
        conflicts
    }

    /// Step 5: drop names the override already places itself.
    pub fn suppress_claimed(&self, computed: &mut DependencySet) {
        computed.retain(|name, _| {
            let keep = !self.overrides.claims(name);
            if !keep {
                debug!("'{}' is placed by the override, dropping computed range", name);
            }
            keep
        });
    }

    pub fn reconcile(&self, used: &[String]) -> Result<DependencySet, ConflictError> {
        let mut computed = self.compute(used);

        if self.options.check_semver_conflicts {
            let conflicts = self.conflicts(&computed);
            if !conflicts.is_empty() {
                return Err(ConflictError { conflicts });
            }
        }

        self.suppress_claimed(&mut computed);
        Ok(computed)
    }
}

/// `dependencies`, then `devDependencies`, then `peerDependencies`, later wins.
pub fn authoritative_ranges(source: &SourceManifest) -> DependencyMap {
    let mut table = DependencyMap::new();
    for field in DependencyField::ALL {
        for (name, range) in source.field(field) {
            table.insert(name.clone(), range.clone());
        }
    }
    table
}

pub fn reconcile(
    source: &SourceManifest,
    used: &[String],
    overrides: &OverrideManifest,
    options: ReconcileOptions,
) -> Result<DependencySet, ConflictError> {
    Reconciler::new(source, overrides, options).reconcile(used)
}
