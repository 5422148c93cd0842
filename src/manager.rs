//! The plug-in manager: discovery, ordered activation, teardown and
//! introspection.
//!
//! Control flow is strictly phased. `search_plugins` is idempotent and
//! cumulative across directories; `load_plugins` re-evaluates verdicts,
//! orders the registry topologically and activates in order;
//! `unload_plugins` tears everything down in reverse order and is
//! terminal (a new search must precede the next load).
//!
//! All operations run on the calling thread; the registry is guarded by a
//! single coarse lock. Reporter callbacks and plug-in hooks must not call
//! back into the same manager while a phase call is in progress on it,
//! except through the request router (which takes the lock only between
//! hooks).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use semver::Version;
use tracing::{debug, warn};

use crate::abi::{self, CreatePluginFn, PluginHandle};
use crate::error::{Outcome, Reporter};
use crate::graph::DependencyGraph;
use crate::library::SharedLibrary;
use crate::metadata::{self, PluginInfo};
use crate::registry::{
    invoke_about_to_be_unloaded, invoke_loaded, invoke_main_exec, DepVerdict, PluginInstance,
    PluginRecord,
};
use crate::resolver;
use crate::router;

#[derive(Default)]
struct ManagerState {
    records: HashMap<String, PluginRecord>,
    // Last load order; walked in reverse at unload.
    load_order: Vec<String>,
    // Directories that yielded at least one plug-in.
    locations: Vec<PathBuf>,
    main_plugin: Option<String>,
}

/// Owns the plug-in registry and drives the lifecycle phases.
///
/// The request router always addresses the process-wide
/// [`PluginManager::instance`]; hosts that activate plug-ins should use
/// it. Host-owned managers created with [`PluginManager::new`] are fine
/// for discovery and introspection.
pub struct PluginManager {
    state: Mutex<ManagerState>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ManagerState::default()),
        }
    }

    /// The process-wide manager, created on first access.
    pub fn instance() -> &'static PluginManager {
        static INSTANCE: OnceLock<PluginManager> = OnceLock::new();
        INSTANCE.get_or_init(PluginManager::new)
    }

    fn state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Directory of the running executable; empty on failure.
    pub fn app_directory() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_default()
    }

    // =======================================================================
    // Phase 1 — search
    // =======================================================================

    /// Scan `dir` for plug-in shared objects and install a record for each
    /// new one found. Only the metadata symbols are read here; no plug-in
    /// instance is created before [`load_plugins`](Self::load_plugins).
    ///
    /// Candidates missing any of the three exported symbols are skipped
    /// silently; duplicate names and undecodable metadata are reported and
    /// skipped. Returns [`Outcome::Success`] iff at least one plug-in was
    /// installed by this call.
    pub fn search_plugins(
        &self,
        dir: &Path,
        recursive: bool,
        mut reporter: Option<&mut Reporter<'_>>,
    ) -> Outcome {
        let (files, walk_error) = list_libraries(dir, recursive);
        if let Some(error) = &walk_error {
            emit(&mut reporter, Outcome::ListFilesError, Some(error));
            // Fatal only when the walk produced no candidates at all.
            if files.is_empty() {
                return Outcome::ListFilesError;
            }
        }

        let mut installed = false;
        for path in files {
            let path_text = path.display().to_string();

            let mut library = SharedLibrary::new();
            if let Err(e) = library.load(&path) {
                debug!(path = %path_text, error = %e, "candidate not loadable, skipped");
                continue;
            }
            if !library.has_symbol(abi::SYMBOL_NAME)
                || !library.has_symbol(abi::SYMBOL_METADATA)
                || !library.has_symbol(abi::SYMBOL_CREATE)
            {
                debug!(path = %path_text, "not a plugin, skipped");
                continue;
            }

            let name = match read_symbol_string(&library, abi::SYMBOL_NAME) {
                Some(name) if metadata::is_valid_name(&name) => name,
                _ => {
                    emit(&mut reporter, Outcome::CannotParseMetadata, Some(&path_text));
                    continue;
                }
            };

            if self.state().records.contains_key(&name) {
                emit(&mut reporter, Outcome::NameAlreadyExists, Some(&path_text));
                continue;
            }

            let info = read_symbol_string(&library, abi::SYMBOL_METADATA)
                .and_then(|doc| match metadata::parse_metadata(doc.as_bytes()) {
                    Ok(info) => Some(info),
                    Err(e) => {
                        debug!(path = %path_text, error = %e, "metadata rejected");
                        None
                    }
                })
                // The declared name must match the exported symbol, or
                // resolver lookups would desynchronize from the registry.
                .filter(|info| info.name == name);

            let Some(info) = info else {
                emit(&mut reporter, Outcome::CannotParseMetadata, Some(&path_text));
                continue;
            };

            debug!(plugin = %name, path = %path_text, "plugin discovered");
            self.state()
                .records
                .insert(name.clone(), PluginRecord::new(name, path, library, info));
            installed = true;
        }

        if installed {
            let mut state = self.state();
            if !state.locations.iter().any(|known| known == dir) {
                state.locations.push(dir.to_path_buf());
            }
            Outcome::Success
        } else {
            Outcome::NothingFound
        }
    }

    // =======================================================================
    // Phase 2 — load
    // =======================================================================

    /// Re-check every record's dependencies, order the registry
    /// topologically and activate every not-yet-activated plug-in in
    /// order.
    ///
    /// With `try_to_continue`, per-plug-in dependency faults are reported
    /// and the offender excluded; otherwise the first fault aborts with
    /// its outcome. A dependency cycle always aborts with
    /// [`Outcome::DependencyCycle`]. Records that are already activated
    /// keep their instances; their `loaded` hook is not re-run.
    pub fn load_plugins(
        &self,
        try_to_continue: bool,
        mut reporter: Option<&mut Reporter<'_>>,
    ) -> Outcome {
        let order = {
            let mut state = self.state();
            let mut sink =
                |code: Outcome, detail: Option<&str>| emit(&mut reporter, code, detail);
            match compute_load_order(&mut state, try_to_continue, &mut sink) {
                Ok(order) => order,
                Err(code) => return code,
            }
        };
        debug!(?order, "load order computed");

        for name in &order {
            let prepared = {
                let state = self.state();
                prepare_activation(&state, name)
            };
            match prepared {
                Prepared::Skip => continue,
                Prepared::Failed(path) => {
                    emit(&mut reporter, Outcome::UnknownError, Some(&path));
                }
                Prepared::Ready { create, deps, path } => {
                    let deps_ptr = if deps.is_empty() {
                        std::ptr::null()
                    } else {
                        deps.as_ptr()
                    };
                    let raw = unsafe { create(router::handle_request, deps_ptr, deps.len()) };
                    let Some(instance) = (unsafe { PluginInstance::from_raw(raw) }) else {
                        warn!(plugin = %name, "plugin factory returned null");
                        emit(&mut reporter, Outcome::UnknownError, Some(&path));
                        continue;
                    };

                    // Install the instance before running the hook, so the
                    // plug-in already counts as loaded from inside loaded().
                    let handle = instance.as_ptr();
                    match self.state().records.get_mut(name.as_str()) {
                        Some(record) => record.instance = Some(instance),
                        None => continue,
                    }
                    unsafe { invoke_loaded(handle) };
                    debug!(plugin = %name, "plugin activated");
                }
            }
        }

        // The main plug-in hook runs once everything is live.
        let main = {
            let state = self.state();
            state
                .main_plugin
                .as_ref()
                .and_then(|name| state.records.get(name))
                .and_then(|record| record.instance.as_ref())
                .map(|instance| instance.as_ptr())
        };
        if let Some(handle) = main {
            if !unsafe { invoke_main_exec(handle) } {
                debug!("main plugin provides no exec hook");
            }
        }

        Outcome::Success
    }

    // =======================================================================
    // Phase 3 — unload
    // =======================================================================

    /// Tear down every record: last load order in reverse first, then any
    /// remaining records. Clears the locations set. Returns
    /// [`Outcome::UnloadNotAll`] if the OS kept any library alive, with
    /// each offender reported individually.
    pub fn unload_plugins(&self, mut reporter: Option<&mut Reporter<'_>>) -> Outcome {
        let mut all_released = true;

        let order = std::mem::take(&mut self.state().load_order);
        for name in order.iter().rev() {
            if let Err(path) = self.unload_one(name) {
                emit(&mut reporter, Outcome::UnloadNotAll, Some(&path));
                all_released = false;
            }
        }

        // Drain records that never made it into the load order.
        loop {
            let next = self.state().records.keys().next().cloned();
            let Some(name) = next else { break };
            if let Err(path) = self.unload_one(&name) {
                emit(&mut reporter, Outcome::UnloadNotAll, Some(&path));
                all_released = false;
            }
        }

        self.state().locations.clear();

        if all_released {
            Outcome::Success
        } else {
            Outcome::UnloadNotAll
        }
    }

    // Tear down a single record. The hook runs while the record is still
    // registered, so router queries from inside it keep resolving; the
    // instance and library go away right after.
    fn unload_one(&self, name: &str) -> Result<(), String> {
        let handle = {
            let state = self.state();
            state
                .records
                .get(name)
                .and_then(|record| record.instance.as_ref())
                .map(|instance| instance.as_ptr())
        };
        if let Some(handle) = handle {
            unsafe { invoke_about_to_be_unloaded(handle) };
        }

        let record = self.state().records.remove(name);
        let Some(mut record) = record else {
            return Ok(());
        };
        record.instance.take();
        match record.library.unload() {
            Ok(()) => {
                debug!(plugin = %name, "plugin unloaded");
                Ok(())
            }
            // Nothing was held, nothing leaked.
            Err(crate::error::LibraryError::NotLoaded) => Ok(()),
            Err(e) => {
                warn!(plugin = %name, error = %e, "library not released");
                Err(record.path.display().to_string())
            }
        }
    }

    // =======================================================================
    // Introspection
    // =======================================================================

    /// Register the plug-in whose `main_exec` hook should run after all
    /// activations. May be called before the plug-in is discovered.
    pub fn register_main_plugin(&self, name: &str) {
        self.state().main_plugin = Some(name.to_string());
    }

    pub fn plugin_count(&self) -> usize {
        self.state().records.len()
    }

    /// Names of all discovered plug-ins, in no particular order.
    pub fn plugin_names(&self) -> Vec<String> {
        self.state().records.keys().cloned().collect()
    }

    /// Directories that yielded at least one plug-in.
    pub fn locations(&self) -> Vec<PathBuf> {
        self.state().locations.clone()
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.state().records.contains_key(name)
    }

    /// True if `name` is present and its version satisfies `min_version`
    /// (same major, at least the requested minor.patch).
    pub fn has_plugin_version(&self, name: &str, min_version: &Version) -> bool {
        self.state()
            .records
            .get(name)
            .is_some_and(|record| metadata::compatible(&record.info.version, min_version))
    }

    /// True if `name` is present, its library is loaded and its instance
    /// exists.
    pub fn is_plugin_loaded(&self, name: &str) -> bool {
        self.state()
            .records
            .get(name)
            .is_some_and(|record| record.library.is_loaded() && record.instance.is_some())
    }

    /// Immutable snapshot of a plug-in's metadata.
    pub fn plugin_info(&self, name: &str) -> Option<PluginInfo> {
        self.state().records.get(name).map(|record| record.info.clone())
    }

    /// The live instance handle of an activated plug-in.
    ///
    /// The pointer stays valid until the plug-in's
    /// `about_to_be_unloaded` returns; callers must not use it past
    /// [`unload_plugins`](Self::unload_plugins).
    pub fn plugin_handle(&self, name: &str) -> Option<NonNull<PluginHandle>> {
        self.state()
            .records
            .get(name)
            .and_then(|record| record.instance.as_ref())
            .map(|instance| instance.as_ptr())
    }

    #[cfg(test)]
    fn insert_record(&self, record: PluginRecord) {
        self.state().records.insert(record.name.clone(), record);
    }

    #[cfg(test)]
    fn load_order(&self) -> Vec<String> {
        self.state().load_order.clone()
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        let residual = !self.state().records.is_empty();
        if residual {
            let _ = self.unload_plugins(None);
        }
    }
}

fn emit(reporter: &mut Option<&mut Reporter<'_>>, code: Outcome, detail: Option<&str>) {
    if let Some(cb) = reporter.as_mut() {
        cb(code, detail);
    }
}

// Steps 1-3 of the load phase: verdicts, graph, sort. Split from the
// activation walk so it stays testable without real shared objects.
fn compute_load_order(
    state: &mut ManagerState,
    try_to_continue: bool,
    reporter: &mut dyn FnMut(Outcome, Option<&str>),
) -> Result<Vec<String>, Outcome> {
    for record in state.records.values_mut() {
        record.graph_id = None;
        record.dep_verdict = DepVerdict::Unknown;
    }

    let names: Vec<String> = state.records.keys().cloned().collect();
    let mut visiting = HashSet::new();
    for name in &names {
        let code = resolver::check_dependencies(&mut state.records, name, &mut visiting, reporter);
        if !code.is_success() && !try_to_continue {
            return Err(code);
        }
    }

    let mut graph = DependencyGraph::with_capacity(state.records.len());
    for name in &names {
        let Some(record) = state.records.get_mut(name) else {
            continue;
        };
        if record.dep_verdict == DepVerdict::Yes {
            record.graph_id = Some(graph.add_node(name.clone()));
        }
    }
    for name in &names {
        let Some(record) = state.records.get(name) else {
            continue;
        };
        let Some(child) = record.graph_id else { continue };
        for dep in &record.info.dependencies {
            if let Some(parent) = state.records.get(&dep.name).and_then(|r| r.graph_id) {
                graph.add_edge(parent, child);
            }
        }
    }

    match graph.topological_sort() {
        Ok(order) => {
            state.load_order = order.clone();
            Ok(order)
        }
        Err(_) => {
            state.load_order.clear();
            reporter(Outcome::DependencyCycle, None);
            Err(Outcome::DependencyCycle)
        }
    }
}

enum Prepared {
    /// Already activated, or no longer registered.
    Skip,
    /// Activation impossible; carries the record's path for the report.
    Failed(String),
    Ready {
        create: CreatePluginFn,
        deps: Vec<*const PluginHandle>,
        path: String,
    },
}

// Gather everything activation needs under the lock; the factory itself
// runs outside it so the plug-in's hooks can reach the router.
fn prepare_activation(state: &ManagerState, name: &str) -> Prepared {
    let Some(record) = state.records.get(name) else {
        return Prepared::Skip;
    };
    if record.instance.is_some() {
        return Prepared::Skip;
    }
    let path = record.path.display().to_string();

    let create: CreatePluginFn =
        match unsafe { record.library.get::<CreatePluginFn>(abi::SYMBOL_CREATE) } {
            Ok(symbol) => *symbol,
            Err(e) => {
                warn!(plugin = %name, error = %e, "cannot fetch plugin factory");
                return Prepared::Failed(path);
            }
        };

    // Dependencies were activated strictly earlier in the order.
    let mut deps = Vec::with_capacity(record.info.dependencies.len());
    for dep in &record.info.dependencies {
        match state
            .records
            .get(&dep.name)
            .and_then(|r| r.instance.as_ref())
        {
            Some(instance) => deps.push(instance.as_ptr().as_ptr() as *const PluginHandle),
            None => {
                warn!(plugin = %name, dependency = %dep.name, "dependency instance missing");
                return Prepared::Failed(path);
            }
        }
    }

    Prepared::Ready { create, deps, path }
}

fn read_symbol_string(library: &SharedLibrary, symbol: &[u8]) -> Option<String> {
    let pointer = match unsafe { library.get::<*const std::ffi::c_char>(symbol) } {
        Ok(symbol) => *symbol,
        Err(_) => return None,
    };
    if pointer.is_null() {
        return None;
    }
    let text = unsafe { std::ffi::CStr::from_ptr(pointer) };
    text.to_str().ok().map(str::to_string)
}

fn is_library_file(path: &Path) -> bool {
    let ext = path.extension().and_then(|e| e.to_str());
    match std::env::consts::OS {
        "macos" => ext == Some("dylib"),
        "linux" => ext == Some("so"),
        "windows" => ext == Some("dll"),
        _ => false,
    }
}

// Regular files with the platform library extension under `dir`,
// best-effort: the walk continues past errors and reports the first one.
fn list_libraries(dir: &Path, recursive: bool) -> (Vec<PathBuf>, Option<String>) {
    let mut files = Vec::new();
    let mut first_error = None;
    walk(dir, recursive, &mut files, &mut first_error);
    (files, first_error)
}

fn walk(
    dir: &Path,
    recursive: bool,
    files: &mut Vec<PathBuf>,
    first_error: &mut Option<String>,
) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if first_error.is_none() {
                *first_error = Some(e.to_string());
            }
            return;
        }
    };
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                if first_error.is_none() {
                    *first_error = Some(e.to_string());
                }
                continue;
            }
        };
        let path = entry.path();
        // is_file()/is_dir() follow symlinks, as the directory iterator
        // reports them.
        if path.is_file() {
            if is_library_file(&path) {
                files.push(path);
            }
        } else if recursive && path.is_dir() {
            walk(&path, true, files, first_error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Dependency;

    fn record(name: &str, version: Version, deps: &[(&str, Version)]) -> PluginRecord {
        let info = PluginInfo {
            name: name.to_string(),
            pretty_name: name.to_string(),
            version,
            author: String::new(),
            url: String::new(),
            license: String::new(),
            copyright: String::new(),
            dependencies: deps
                .iter()
                .map(|(dep_name, dep_version)| Dependency {
                    name: dep_name.to_string(),
                    version: dep_version.clone(),
                })
                .collect(),
        };
        PluginRecord::new(
            name.to_string(),
            PathBuf::from(format!("/plugins/lib{name}.so")),
            SharedLibrary::new(),
            info,
        )
    }

    fn manager_with(records: Vec<PluginRecord>) -> PluginManager {
        let manager = PluginManager::new();
        for record in records {
            manager.insert_record(record);
        }
        manager
    }

    fn v1() -> Version {
        Version::new(1, 0, 0)
    }

    fn compute(
        manager: &PluginManager,
        try_to_continue: bool,
    ) -> (Result<Vec<String>, Outcome>, Vec<Outcome>) {
        let mut reported = Vec::new();
        let mut state = manager.state();
        let result = compute_load_order(&mut state, try_to_continue, &mut |code, _| {
            reported.push(code)
        });
        (result, reported)
    }

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_linear_chain_load_order() {
        let manager = manager_with(vec![
            record("a", v1(), &[]),
            record("b", v1(), &[("a", v1())]),
            record("c", v1(), &[("b", v1())]),
        ]);
        let (result, reported) = compute(&manager, true);
        assert_eq!(result.unwrap(), vec!["a", "b", "c"]);
        assert!(reported.is_empty());
    }

    #[test]
    fn test_diamond_load_order() {
        let manager = manager_with(vec![
            record("a", v1(), &[]),
            record("b", v1(), &[("a", v1())]),
            record("c", v1(), &[("a", v1())]),
            record("d", v1(), &[("b", v1()), ("c", v1())]),
        ]);
        let (result, _) = compute(&manager, true);
        let order = result.unwrap();
        assert_eq!(order.len(), 4);
        assert!(position(&order, "a") < position(&order, "b"));
        assert!(position(&order, "a") < position(&order, "c"));
        assert!(position(&order, "b") < position(&order, "d"));
        assert!(position(&order, "c") < position(&order, "d"));
    }

    #[test]
    fn test_missing_dependency_excludes_plugin() {
        let manager = manager_with(vec![record("x", v1(), &[("y", v1())])]);
        let (result, reported) = compute(&manager, true);
        assert_eq!(result.unwrap(), Vec::<String>::new());
        assert_eq!(reported, vec![Outcome::DependencyNotFound]);
    }

    #[test]
    fn test_missing_dependency_aborts_without_try_to_continue() {
        let manager = manager_with(vec![record("x", v1(), &[("y", v1())])]);
        let (result, _) = compute(&manager, false);
        assert_eq!(result, Err(Outcome::DependencyNotFound));
    }

    #[test]
    fn test_bad_version_keeps_the_dependency_loadable() {
        let manager = manager_with(vec![
            record("a", v1(), &[]),
            record("b", v1(), &[("a", Version::new(2, 0, 0))]),
        ]);
        let (result, reported) = compute(&manager, true);
        assert_eq!(result.unwrap(), vec!["a"]);
        assert_eq!(reported, vec![Outcome::DependencyBadVersion]);
    }

    #[test]
    fn test_cycle_aborts_the_load() {
        let manager = manager_with(vec![
            record("a", v1(), &[("b", v1())]),
            record("b", v1(), &[("a", v1())]),
        ]);
        let (result, reported) = compute(&manager, true);
        assert_eq!(result, Err(Outcome::DependencyCycle));
        assert_eq!(reported, vec![Outcome::DependencyCycle]);
        assert!(manager.load_order().is_empty());
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let manager = manager_with(vec![record("a", v1(), &[("a", v1())])]);
        let (result, _) = compute(&manager, true);
        assert_eq!(result, Err(Outcome::DependencyCycle));
    }

    #[test]
    fn test_graph_only_covers_yes_verdicts() {
        let manager = manager_with(vec![
            record("a", v1(), &[]),
            record("x", v1(), &[("y", v1())]),
        ]);
        let (result, _) = compute(&manager, true);
        assert_eq!(result.unwrap(), vec!["a"]);
        let state = manager.state();
        for record in state.records.values() {
            assert_eq!(
                record.graph_id.is_some(),
                record.dep_verdict == DepVerdict::Yes
            );
        }
    }

    #[test]
    fn test_recompute_resets_verdicts_and_graph_ids() {
        let manager = manager_with(vec![
            record("a", v1(), &[]),
            record("b", v1(), &[("a", v1())]),
        ]);
        let (first, _) = compute(&manager, true);
        let (second, _) = compute(&manager, true);
        assert_eq!(first.unwrap(), second.unwrap());
    }

    #[test]
    fn test_empty_dependencies_activate_without_edges() {
        let manager = manager_with(vec![record("solo", v1(), &[])]);
        let (result, reported) = compute(&manager, true);
        assert_eq!(result.unwrap(), vec!["solo"]);
        assert!(reported.is_empty());
    }

    #[test]
    fn test_load_plugins_with_missing_dependency_still_succeeds() {
        let manager = manager_with(vec![record("x", v1(), &[("y", v1())])]);
        let mut reported = Vec::new();
        let mut reporter = |code: Outcome, _: Option<&str>| reported.push(code);
        let outcome = manager.load_plugins(true, Some(&mut reporter));
        assert_eq!(outcome, Outcome::Success);
        assert_eq!(reported, vec![Outcome::DependencyNotFound]);
        assert!(!manager.is_plugin_loaded("x"));
    }

    #[test]
    fn test_load_plugins_cycle_outcome() {
        let manager = manager_with(vec![
            record("a", v1(), &[("b", v1())]),
            record("b", v1(), &[("a", v1())]),
        ]);
        assert_eq!(manager.load_plugins(true, None), Outcome::DependencyCycle);
        assert!(!manager.is_plugin_loaded("a"));
        assert!(!manager.is_plugin_loaded("b"));
    }

    #[test]
    fn test_unload_drains_registry_and_locations() {
        let manager = manager_with(vec![
            record("a", v1(), &[]),
            record("b", v1(), &[("a", v1())]),
        ]);
        manager.state().locations.push(PathBuf::from("/plugins"));
        assert_eq!(manager.unload_plugins(None), Outcome::Success);
        assert_eq!(manager.plugin_count(), 0);
        assert!(manager.locations().is_empty());
        assert!(manager.load_order().is_empty());
    }

    #[test]
    fn test_introspection_on_registry() {
        let manager = manager_with(vec![record("a", Version::new(1, 2, 3), &[])]);
        assert!(manager.has_plugin("a"));
        assert!(!manager.has_plugin("b"));
        assert!(manager.has_plugin_version("a", &v1()));
        assert!(!manager.has_plugin_version("a", &Version::new(1, 3, 0)));
        assert!(!manager.has_plugin_version("a", &Version::new(2, 0, 0)));
        assert!(!manager.is_plugin_loaded("a"));
        assert_eq!(manager.plugin_info("a").unwrap().version, Version::new(1, 2, 3));
        assert!(manager.plugin_handle("a").is_none());
        assert_eq!(manager.plugin_names(), vec!["a"]);
    }

    #[test]
    fn test_is_library_file_filters_by_platform_extension() {
        #[cfg(target_os = "linux")]
        {
            assert!(is_library_file(Path::new("/p/libx.so")));
            assert!(!is_library_file(Path::new("/p/libx.dylib")));
            assert!(!is_library_file(Path::new("/p/readme.txt")));
        }
        #[cfg(target_os = "macos")]
        {
            assert!(is_library_file(Path::new("/p/libx.dylib")));
            assert!(!is_library_file(Path::new("/p/libx.so")));
        }
        #[cfg(windows)]
        {
            assert!(is_library_file(Path::new(r"C:\p\x.dll")));
            assert!(!is_library_file(Path::new(r"C:\p\x.so")));
        }
    }

    #[test]
    fn test_app_directory_points_at_the_executable() {
        let dir = PluginManager::app_directory();
        assert!(!dir.as_os_str().is_empty());
    }
}
