//! Per-plug-in bookkeeping: the record, the live instance wrapper and the
//! three-valued dependency verdict.
//!
//! Records are owned exclusively by the manager. A record exists from
//! successful discovery until unload; its library stays loaded for that
//! whole window, while `instance` is present only between activation and
//! teardown.

use std::path::PathBuf;
use std::ptr::NonNull;

use crate::abi::PluginHandle;
use crate::library::SharedLibrary;
use crate::metadata::PluginInfo;

/// Three-valued dependency verdict.
///
/// `Unknown` is the signal to perform the check on first visit; it is
/// reset before every load pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum DepVerdict {
    #[default]
    Unknown,
    Yes,
    No,
}

/// Owning wrapper around a live plug-in instance.
///
/// Dropping the wrapper runs the instance's `destroy` entry, which frees
/// the state and the handle on the plug-in's side of the boundary.
pub(crate) struct PluginInstance {
    handle: NonNull<PluginHandle>,
}

// Instances are only touched by the thread driving the manager; the
// registry lock serializes all access (single-writer discipline).
unsafe impl Send for PluginInstance {}

impl PluginInstance {
    /// Take ownership of a handle returned by the plug-in factory.
    ///
    /// # Safety
    /// `ptr` must be null or a handle freshly returned by
    /// `plugkit_create_plugin`, not owned by anyone else.
    pub unsafe fn from_raw(ptr: *mut PluginHandle) -> Option<Self> {
        NonNull::new(ptr).map(|handle| Self { handle })
    }

    /// Non-owning pointer handed to dependants at their activation.
    pub fn as_ptr(&self) -> NonNull<PluginHandle> {
        self.handle
    }
}

/// Run the `loaded` hook of a live instance.
///
/// # Safety
/// `handle` must point at an instance that has not been destroyed.
pub(crate) unsafe fn invoke_loaded(handle: NonNull<PluginHandle>) {
    let h = handle.as_ref();
    (h.loaded)(h.state)
}

/// Run the `about_to_be_unloaded` hook of a live instance.
///
/// # Safety
/// Same contract as [`invoke_loaded`].
pub(crate) unsafe fn invoke_about_to_be_unloaded(handle: NonNull<PluginHandle>) {
    let h = handle.as_ref();
    (h.about_to_be_unloaded)(h.state)
}

/// Run the main-plug-in hook if the instance provides one; returns
/// whether it was present.
///
/// # Safety
/// Same contract as [`invoke_loaded`].
pub(crate) unsafe fn invoke_main_exec(handle: NonNull<PluginHandle>) -> bool {
    let h = handle.as_ref();
    match h.main_exec {
        Some(hook) => {
            hook(h.state);
            true
        }
        None => false,
    }
}

impl Drop for PluginInstance {
    fn drop(&mut self) {
        let ptr = self.handle.as_ptr();
        let destroy = unsafe { (*ptr).destroy };
        unsafe { destroy(ptr) }
    }
}

impl std::fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInstance")
            .field("handle", &self.handle)
            .finish()
    }
}

/// The manager's bookkeeping structure for one discovered plug-in.
#[derive(Debug)]
pub(crate) struct PluginRecord {
    pub name: String,
    pub path: PathBuf,
    pub library: SharedLibrary,
    pub info: PluginInfo,
    /// Present iff the plug-in is activated.
    pub instance: Option<PluginInstance>,
    pub dep_verdict: DepVerdict,
    /// Index into the current dependency graph; `None` when excluded.
    pub graph_id: Option<usize>,
}

impl PluginRecord {
    pub fn new(name: String, path: PathBuf, library: SharedLibrary, info: PluginInfo) -> Self {
        Self {
            name,
            path,
            library,
            info,
            instance: None,
            dep_verdict: DepVerdict::Unknown,
            graph_id: None,
        }
    }
}

impl Drop for PluginRecord {
    // Safety net for records that were never unloaded explicitly
    // (manager teardown): run the hook, drop the instance, release the
    // library.
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            unsafe { invoke_about_to_be_unloaded(instance.as_ptr()) };
            drop(instance);
        }
        if self.library.is_loaded() {
            if let Err(e) = self.library.unload() {
                tracing::warn!(plugin = %self.name, error = %e, "library not released at teardown");
            }
        }
    }
}
