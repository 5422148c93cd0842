//! Outcome codes and error types shared across the manager.
//!
//! `Outcome` is the closed, ABI-stable code set returned by the phase
//! entry points and delivered to reporter callbacks. The typed errors
//! (`LibraryError`, `MetadataError`) never cross the phase boundary;
//! they fold to an `Outcome` or to the invalid-metadata sentinel.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Phase-level outcome codes with stable numeric values.
///
/// `0` is success, `1` a generic failure; search codes live in the 100s,
/// load codes in the 200s and unload codes in the 300s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    UnknownError,

    // Raised by search_plugins()
    NothingFound,
    NameAlreadyExists,
    CannotParseMetadata,
    ListFilesError,

    // Raised by load_plugins()
    DependencyBadVersion,
    DependencyNotFound,
    DependencyCycle,

    // Raised by unload_plugins()
    UnloadNotAll,
}

impl Outcome {
    /// Stable wire value of this outcome.
    pub fn code(self) -> u16 {
        match self {
            Outcome::Success => 0,
            Outcome::UnknownError => 1,
            Outcome::NothingFound => 100,
            Outcome::NameAlreadyExists => 101,
            Outcome::CannotParseMetadata => 102,
            Outcome::ListFilesError => 103,
            Outcome::DependencyBadVersion => 200,
            Outcome::DependencyNotFound => 201,
            Outcome::DependencyCycle => 202,
            Outcome::UnloadNotAll => 300,
        }
    }

    /// Human-readable description of this outcome.
    pub fn message(self) -> &'static str {
        match self {
            Outcome::Success => "Success",
            Outcome::UnknownError => "Unknown error",
            Outcome::NothingFound => "No plugins were found in that directory",
            Outcome::NameAlreadyExists => "A plugin with the same name was already found",
            Outcome::CannotParseMetadata => "Plugin metadata cannot be parsed",
            Outcome::ListFilesError => "An error occurred during the scan of the plugin directory",
            Outcome::DependencyBadVersion => {
                "The plugin requires a dependency that is in an incompatible version"
            }
            Outcome::DependencyNotFound => "The plugin requires a dependency that was not found",
            Outcome::DependencyCycle => {
                "The dependency graph contains a cycle, making it impossible to load plugins"
            }
            Outcome::UnloadNotAll => "Not all plugins have been unloaded",
        }
    }

    pub fn is_success(self) -> bool {
        self == Outcome::Success
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Callback invoked for each fault during a phase call.
///
/// The second argument is a borrowed detail string, typically the path of
/// the offending shared object.
pub type Reporter<'a> = dyn FnMut(Outcome, Option<&str>) + 'a;

/// Errors raised by the [`SharedLibrary`](crate::library::SharedLibrary)
/// wrapper. The message carries the platform loader's own error text.
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("failed to load library {path:?}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("failed to unload library: {0}")]
    Close(String),

    #[error("symbol not found: {0}")]
    Symbol(String),

    #[error("no library loaded")]
    NotLoaded,
}

/// Errors raised by the metadata decoder.
///
/// The manager folds all of these to the invalid-metadata sentinel and
/// reports [`Outcome::CannotParseMetadata`].
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("metadata is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid version in field '{field}': {source}")]
    Version {
        field: String,
        source: semver::Error,
    },

    #[error("plugin API {found} is not compatible with host API {expected}")]
    IncompatibleApi {
        expected: semver::Version,
        found: semver::Version,
    },

    #[error("plugin name '{0}' is not a valid identifier")]
    InvalidName(String),
}
