//! Lifecycle engine for native plug-ins delivered as shared objects.
//!
//! The host links this crate, points it at one or more plug-in
//! directories and lets it bring every discovered plug-in into a running
//! state in dependency order:
//!
//! - **Search**: scan directories for shared objects exporting the
//!   plug-in symbols, decode their embedded metadata, install a record
//!   per unique name.
//! - **Load**: verify declared dependencies (presence + semver
//!   compatibility), topologically order the dependency graph, activate
//!   each plug-in after all of its dependencies.
//! - **Unload**: tear everything down leaves-first, mirroring the load
//!   order.
//!
//! Plug-ins talk to the manager (and to their declared dependencies)
//! over a small untyped request bus; see [`abi`].
//!
//! ```no_run
//! use plugkit::PluginManager;
//!
//! let manager = PluginManager::instance();
//! let dir = PluginManager::app_directory().join("plugin");
//! manager.search_plugins(&dir, false, None);
//! manager.load_plugins(true, None);
//! manager.unload_plugins(None);
//! ```

pub mod abi;
pub mod error;
pub mod library;
pub mod manager;
pub mod metadata;

mod graph;
mod registry;
mod resolver;
mod router;

pub use error::{LibraryError, MetadataError, Outcome, Reporter};
pub use library::SharedLibrary;
pub use manager::PluginManager;
pub use metadata::{compatible, Dependency, PluginInfo, PLUGIN_API};
