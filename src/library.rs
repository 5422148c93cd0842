//! Low-level access to a shared library.
//!
//! [`SharedLibrary`] wraps the platform linker behind a small, owned
//! handle: load a shared object by path, probe and fetch symbols, unload.
//! Each value represents at most one loaded library and is not copyable;
//! the handle is released on drop if `unload` was never called.

use std::path::Path;

use crate::error::LibraryError;

/// Owned handle to a dynamically loaded shared object.
pub struct SharedLibrary {
    handle: Option<libloading::Library>,
}

impl SharedLibrary {
    /// Create a handle with no library associated.
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Load the library at `path`.
    ///
    /// If a library is already held it is unloaded first; a failure to
    /// release the previous handle aborts the load.
    pub fn load(&mut self, path: &Path) -> Result<(), LibraryError> {
        if self.is_loaded() {
            self.unload()?;
        }

        let library = unsafe { libloading::Library::new(path) }.map_err(|e| {
            LibraryError::Open {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        self.handle = Some(library);
        Ok(())
    }

    /// Open the library at `path` as a fresh handle.
    pub fn open(path: &Path) -> Result<Self, LibraryError> {
        let mut lib = Self::new();
        lib.load(path)?;
        Ok(lib)
    }

    /// True if a library handle is currently held.
    pub fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    /// Check whether the library exports `symbol`.
    ///
    /// `symbol` must be NUL-terminated, e.g. `b"plugkit_name\0"`.
    pub fn has_symbol(&self, symbol: &[u8]) -> bool {
        match &self.handle {
            Some(library) => unsafe { library.get::<*const ()>(symbol).is_ok() },
            None => false,
        }
    }

    /// Fetch the symbol named `symbol`, typed as `T`.
    ///
    /// `symbol` must be NUL-terminated. The returned [`libloading::Symbol`]
    /// borrows this library and cannot outlive it.
    ///
    /// # Safety
    /// The caller must guarantee that `T` matches the actual type of the
    /// exported symbol; the contract is by name and agreed layout only.
    pub unsafe fn get<'lib, T>(
        &'lib self,
        symbol: &[u8],
    ) -> Result<libloading::Symbol<'lib, T>, LibraryError> {
        let library = self.handle.as_ref().ok_or(LibraryError::NotLoaded)?;
        library
            .get(symbol)
            .map_err(|e| LibraryError::Symbol(e.to_string()))
    }

    /// Release the held handle.
    ///
    /// An `Err(LibraryError::Close)` means the OS refused to free the
    /// library; the handle is dropped regardless.
    pub fn unload(&mut self) -> Result<(), LibraryError> {
        let library = self.handle.take().ok_or(LibraryError::NotLoaded)?;
        library
            .close()
            .map_err(|e| LibraryError::Close(e.to_string()))
    }
}

impl Default for SharedLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SharedLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedLibrary")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
