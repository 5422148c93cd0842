//! Dependency resolution: per-record verdicts over the registry.
//!
//! `check_dependencies` walks a record's declared dependencies in order,
//! verifies presence and version compatibility, recurses transitively and
//! memoizes the verdict on the record. The pass is O(N + E) across a full
//! load thanks to the memoization.
//!
//! Cycles are not failures here: a record currently being visited counts
//! as satisfied, so every member of a cycle ends up with a `Yes` verdict
//! and the topological sort reports the cycle instead.

use std::collections::{HashMap, HashSet};

use crate::error::Outcome;
use crate::metadata::{compatible, Dependency};
use crate::registry::{DepVerdict, PluginRecord};

// Re-derive the failure code for a memoized `No` verdict: `No` is only
// ever set by a direct missing-dependency or bad-version hit.
fn memoized_failure(records: &HashMap<String, PluginRecord>, deps: &[Dependency]) -> Outcome {
    if deps.iter().any(|dep| !records.contains_key(&dep.name)) {
        Outcome::DependencyNotFound
    } else {
        Outcome::DependencyBadVersion
    }
}

/// Check that every dependency of `name` is present and compatible,
/// transitively. Emits the failing outcome to `reporter` (with the
/// dependant's path) on first detection only.
pub(crate) fn check_dependencies(
    records: &mut HashMap<String, PluginRecord>,
    name: &str,
    visiting: &mut HashSet<String>,
    reporter: &mut dyn FnMut(Outcome, Option<&str>),
) -> Outcome {
    let (verdict, deps, path) = match records.get(name) {
        Some(record) => (
            record.dep_verdict,
            record.info.dependencies.clone(),
            record.path.clone(),
        ),
        None => return Outcome::DependencyNotFound,
    };

    match verdict {
        DepVerdict::Yes => return Outcome::Success,
        DepVerdict::No => return memoized_failure(records, &deps),
        DepVerdict::Unknown => {}
    }

    // A record on the current visit path is part of a cycle; treat the
    // link as satisfied and let the sort detect it.
    if visiting.contains(name) {
        return Outcome::Success;
    }
    visiting.insert(name.to_string());

    let path_text = path.display().to_string();
    let mut result = Outcome::Success;

    for dep in &deps {
        let failure = match records.get(&dep.name) {
            None => Some(Outcome::DependencyNotFound),
            Some(found) if !compatible(&found.info.version, &dep.version) => {
                Some(Outcome::DependencyBadVersion)
            }
            Some(_) => None,
        };

        match failure {
            Some(code) => {
                if let Some(record) = records.get_mut(name) {
                    record.dep_verdict = DepVerdict::No;
                }
                reporter(code, Some(&path_text));
                result = code;
                break;
            }
            None => {
                // The dependant's verdict stays Unknown when a transitive
                // check fails; only the failing record is marked.
                let code = check_dependencies(records, &dep.name, visiting, reporter);
                if !code.is_success() {
                    result = code;
                    break;
                }
            }
        }
    }

    if result.is_success() {
        if let Some(record) = records.get_mut(name) {
            record.dep_verdict = DepVerdict::Yes;
        }
    }

    visiting.remove(name);
    result
}
