//! The plug-in ABI: exported symbols, instance vtable, request codes,
//! and the authoring helpers plug-in crates use to emit them.
//!
//! Every plug-in shared object exports three symbols with C linkage:
//!
//! - `plugkit_name` — pointer to a NUL-terminated ASCII identifier
//! - `plugkit_metadata` — pointer to a NUL-terminated UTF-8 JSON document
//! - `plugkit_create_plugin` — factory, see [`CreatePluginFn`]
//!
//! The factory receives the manager's [`RouterFn`] and a borrowed array of
//! its dependencies' live [`PluginHandle`]s, in declaration order, and
//! returns a freshly allocated handle. The handle's `destroy` entry frees
//! both the state and the handle itself, so allocations never cross the
//! library boundary.
//!
//! Rust plug-ins implement [`Plugin`] and invoke [`declare_plugin!`] to
//! emit all three symbols.

use std::ffi::{c_char, c_void, CStr, CString};

use crate::metadata::PluginInfo;

/// Exported symbol holding the plug-in identifier.
pub const SYMBOL_NAME: &[u8] = b"plugkit_name\0";
/// Exported symbol holding the metadata JSON document.
pub const SYMBOL_METADATA: &[u8] = b"plugkit_metadata\0";
/// Exported factory symbol.
pub const SYMBOL_CREATE: &[u8] = b"plugkit_create_plugin\0";

/// The single C-ABI entry point handed to every plug-in at construction.
///
/// Arguments: sender name, request code, payload slot, payload-size slot.
/// Returns a [`Reply`] code. Payloads written by the manager are heap
/// allocations whose ownership transfers to the caller; release them with
/// [`free_string`], [`free_count`] or [`PluginInfoRaw::free`].
pub type RouterFn = unsafe extern "C" fn(
    sender: *const c_char,
    code: u16,
    data: *mut *mut c_void,
    data_size: *mut u32,
) -> u16;

/// Signature of the exported `plugkit_create_plugin` factory.
pub type CreatePluginFn = unsafe extern "C" fn(
    router: RouterFn,
    deps: *const *const PluginHandle,
    dep_count: usize,
) -> *mut PluginHandle;

/// First request code available for plug-in-defined protocols. The
/// manager answers [`Reply::UnknownRequest`] for anything at or above it.
pub const USER_REQUEST_BASE: u16 = 100;

/// Manager-directed request codes (stable values).
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Request {
    /// Payload out: the host application directory as a string.
    GetAppDirectory = 0,
    /// Payload out: the host plug-in API version as a string.
    GetPluginApi = 1,
    /// Payload out: the registry size as a heap-allocated `u64`.
    GetPluginsCount = 2,
    /// Payload in: plug-in name, or null for the sender.
    /// Payload out: a heap-allocated [`PluginInfoRaw`] snapshot.
    GetPluginInfo = 3,
    /// Payload in: plug-in name, or null for the sender.
    /// Payload out: the version as a string.
    GetPluginVersion = 4,
    /// Payload in: plug-in name. Replies [`Reply::True`]/[`Reply::False`],
    /// no payload.
    CheckPlugin = 5,
    /// Same as [`Request::CheckPlugin`] for the activation predicate.
    CheckPluginLoaded = 6,
}

impl Request {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Request::GetAppDirectory),
            1 => Some(Request::GetPluginApi),
            2 => Some(Request::GetPluginsCount),
            3 => Some(Request::GetPluginInfo),
            4 => Some(Request::GetPluginVersion),
            5 => Some(Request::CheckPlugin),
            6 => Some(Request::CheckPluginLoaded),
            _ => None,
        }
    }
}

/// Reply codes returned by the router and by peer `handle_request`
/// implementations (stable values).
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reply {
    Success = 0,
    CommonError = 1,
    True = 2,
    False = 3,
    UnknownRequest = 4,
    DataSizeNull = 5,
    NotADependency = 6,
    NotFound = 7,
}

impl Reply {
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Live plug-in instance, as seen across the library boundary.
///
/// `state` is opaque to the host. All hooks are invoked on the host
/// thread driving the manager. `main_exec` may be null for plug-ins that
/// cannot serve as the main plug-in.
#[repr(C)]
pub struct PluginHandle {
    pub state: *mut c_void,
    pub loaded: unsafe extern "C" fn(state: *mut c_void),
    pub about_to_be_unloaded: unsafe extern "C" fn(state: *mut c_void),
    pub handle_request: unsafe extern "C" fn(
        state: *mut c_void,
        sender: *const c_char,
        code: u16,
        data: *mut *mut c_void,
        data_size: *mut u32,
    ) -> u16,
    pub main_exec: Option<unsafe extern "C" fn(state: *mut c_void)>,
    pub destroy: unsafe extern "C" fn(handle: *mut PluginHandle),
}

/// Pointer-sized static exported as `plugkit_name`/`plugkit_metadata`.
///
/// The wrapped pointer targets a NUL-terminated, `'static` string.
#[repr(transparent)]
pub struct SymbolStr(*const c_char);

// The pointee is immutable 'static data.
unsafe impl Sync for SymbolStr {}

impl SymbolStr {
    /// `text` must end with a NUL byte (`concat!(.., "\0")`).
    pub const fn from_static(text: &'static str) -> Self {
        Self(text.as_ptr() as *const c_char)
    }

    pub fn as_ptr(&self) -> *const c_char {
        self.0
    }
}

// CString conversion that folds interior NULs to an empty string instead
// of panicking; metadata strings come from arbitrary JSON.
pub(crate) fn c_string(text: &str) -> CString {
    CString::new(text).unwrap_or_default()
}

/// Release a string payload returned by the router.
///
/// # Safety
/// `ptr` must be null or a string allocated by this library whose
/// ownership was transferred to the caller.
pub unsafe fn free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Release a count payload returned by [`Request::GetPluginsCount`].
///
/// # Safety
/// Same contract as [`free_string`].
pub unsafe fn free_count(ptr: *mut u64) {
    if !ptr.is_null() {
        drop(Box::from_raw(ptr));
    }
}

/// ABI-stable metadata snapshot served by [`Request::GetPluginInfo`].
///
/// All strings are NUL-terminated heap allocations owned by the receiver;
/// release the whole snapshot with [`PluginInfoRaw::free`].
#[repr(C)]
pub struct PluginInfoRaw {
    pub name: *mut c_char,
    pub pretty_name: *mut c_char,
    pub version: *mut c_char,
    pub author: *mut c_char,
    pub url: *mut c_char,
    pub license: *mut c_char,
    pub copyright: *mut c_char,
    pub dependencies: *mut DependencyRaw,
    pub dependencies_len: u32,
}

/// One dependency entry inside [`PluginInfoRaw`].
#[repr(C)]
pub struct DependencyRaw {
    pub name: *mut c_char,
    pub version: *mut c_char,
}

impl PluginInfoRaw {
    pub(crate) fn from_info(info: &PluginInfo) -> Self {
        let deps: Vec<DependencyRaw> = info
            .dependencies
            .iter()
            .map(|dep| DependencyRaw {
                name: c_string(&dep.name).into_raw(),
                version: c_string(&dep.version.to_string()).into_raw(),
            })
            .collect();
        let dependencies_len = deps.len() as u32;
        let dependencies = if deps.is_empty() {
            std::ptr::null_mut()
        } else {
            Box::into_raw(deps.into_boxed_slice()) as *mut DependencyRaw
        };

        Self {
            name: c_string(&info.name).into_raw(),
            pretty_name: c_string(&info.pretty_name).into_raw(),
            version: c_string(&info.version.to_string()).into_raw(),
            author: c_string(&info.author).into_raw(),
            url: c_string(&info.url).into_raw(),
            license: c_string(&info.license).into_raw(),
            copyright: c_string(&info.copyright).into_raw(),
            dependencies,
            dependencies_len,
        }
    }

    /// Release a snapshot previously returned over the router.
    ///
    /// # Safety
    /// `ptr` must be null or a snapshot allocated by this library whose
    /// ownership was transferred to the caller, freed at most once.
    pub unsafe fn free(ptr: *mut PluginInfoRaw) {
        if ptr.is_null() {
            return;
        }
        let raw = Box::from_raw(ptr);
        for field in [
            raw.name,
            raw.pretty_name,
            raw.version,
            raw.author,
            raw.url,
            raw.license,
            raw.copyright,
        ] {
            free_string(field);
        }
        if !raw.dependencies.is_null() {
            let len = raw.dependencies_len as usize;
            let deps = Vec::from_raw_parts(raw.dependencies, len, len);
            for dep in deps {
                free_string(dep.name);
                free_string(dep.version);
            }
        }
    }
}

// ===========================================================================
// Authoring side
// ===========================================================================

/// Interface implemented by Rust plug-ins exported with
/// [`declare_plugin!`].
///
/// `loaded` always runs after every dependency's `loaded` returned;
/// dependencies stay valid until `about_to_be_unloaded` returns.
pub trait Plugin: Sized {
    /// Construct the instance. `ctx` carries the manager router and the
    /// dependency peers; store it if the plug-in needs to send requests.
    fn create(ctx: PluginContext) -> Self;

    fn loaded(&mut self) {}

    fn about_to_be_unloaded(&mut self) {}

    /// Hook run after all activations when this plug-in was registered as
    /// the main plug-in.
    fn main_exec(&mut self) {}

    /// Serve a request from a dependant peer. Codes below
    /// [`USER_REQUEST_BASE`] are reserved.
    fn handle_request(
        &mut self,
        sender: &str,
        code: u16,
        data: *mut *mut c_void,
        data_size: *mut u32,
    ) -> u16 {
        let _ = (sender, code, data, data_size);
        Reply::UnknownRequest.code()
    }
}

/// Per-instance view of the manager and of the declared dependencies.
pub struct PluginContext {
    name: CString,
    router: RouterFn,
    peers: Vec<(String, *const PluginHandle)>,
}

impl PluginContext {
    /// Send a request to the manager.
    pub fn send_to_manager(
        &self,
        code: u16,
        data: &mut *mut c_void,
        data_size: &mut u32,
    ) -> u16 {
        unsafe { (self.router)(self.name.as_ptr(), code, data, data_size) }
    }

    /// Send a request to a declared dependency.
    ///
    /// Only peers named in this plug-in's `dependencies` metadata are
    /// addressable; any other receiver yields [`Reply::NotADependency`].
    pub fn send_to_peer(
        &self,
        receiver: &str,
        code: u16,
        data: &mut *mut c_void,
        data_size: &mut u32,
    ) -> u16 {
        let Some((_, handle)) = self.peers.iter().find(|(name, _)| name == receiver) else {
            return Reply::NotADependency.code();
        };
        unsafe {
            let handle = &**handle;
            (handle.handle_request)(handle.state, self.name.as_ptr(), code, data, data_size)
        }
    }

    /// Names of the addressable peers, in declaration order.
    pub fn peer_names(&self) -> impl Iterator<Item = &str> {
        self.peers.iter().map(|(name, _)| name.as_str())
    }
}

// Dependency names in declaration order, straight from the metadata
// document. Malformed input yields an empty list; the manager has already
// rejected such a plug-in before its factory can run.
#[doc(hidden)]
pub fn dependency_names(metadata: &str) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(metadata) else {
        return Vec::new();
    };
    let Some(deps) = value.get("dependencies").and_then(|d| d.as_array()) else {
        return Vec::new();
    };
    deps.iter()
        .filter_map(|dep| dep.get("name").and_then(|n| n.as_str()))
        .map(str::to_string)
        .collect()
}

unsafe extern "C" fn loaded_shim<P: Plugin>(state: *mut c_void) {
    (*(state as *mut P)).loaded()
}

unsafe extern "C" fn unloaded_shim<P: Plugin>(state: *mut c_void) {
    (*(state as *mut P)).about_to_be_unloaded()
}

unsafe extern "C" fn main_exec_shim<P: Plugin>(state: *mut c_void) {
    (*(state as *mut P)).main_exec()
}

unsafe extern "C" fn request_shim<P: Plugin>(
    state: *mut c_void,
    sender: *const c_char,
    code: u16,
    data: *mut *mut c_void,
    data_size: *mut u32,
) -> u16 {
    let sender = if sender.is_null() {
        ""
    } else {
        CStr::from_ptr(sender).to_str().unwrap_or("")
    };
    (*(state as *mut P)).handle_request(sender, code, data, data_size)
}

unsafe extern "C" fn destroy_shim<P: Plugin>(handle: *mut PluginHandle) {
    if handle.is_null() {
        return;
    }
    let handle = Box::from_raw(handle);
    drop(Box::from_raw(handle.state as *mut P));
}

/// Factory body emitted by [`declare_plugin!`].
///
/// # Safety
/// `deps`, when non-null, must point at `dep_count` valid handles that
/// outlive the returned instance (the manager's leaves-first unload
/// guarantees this).
#[doc(hidden)]
pub unsafe fn export_plugin<P: Plugin>(
    name: &str,
    metadata: &str,
    router: RouterFn,
    deps: *const *const PluginHandle,
    dep_count: usize,
) -> *mut PluginHandle {
    let handles: &[*const PluginHandle] = if deps.is_null() || dep_count == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(deps, dep_count)
    };

    let peers = dependency_names(metadata)
        .into_iter()
        .zip(handles.iter().copied())
        .collect();

    let ctx = PluginContext {
        name: c_string(name),
        router,
        peers,
    };

    let state = Box::into_raw(Box::new(P::create(ctx))) as *mut c_void;
    Box::into_raw(Box::new(PluginHandle {
        state,
        loaded: loaded_shim::<P>,
        about_to_be_unloaded: unloaded_shim::<P>,
        handle_request: request_shim::<P>,
        main_exec: Some(main_exec_shim::<P>),
        destroy: destroy_shim::<P>,
    }))
}

/// Emit the three exported symbols for a [`Plugin`] implementation.
///
/// `$name` must equal the `name` field of `$metadata`, which must be the
/// full metadata JSON document.
///
/// ```ignore
/// struct MyPlugin { ctx: plugkit::abi::PluginContext }
///
/// impl plugkit::abi::Plugin for MyPlugin {
///     fn create(ctx: plugkit::abi::PluginContext) -> Self {
///         Self { ctx }
///     }
/// }
///
/// plugkit::declare_plugin!(MyPlugin, "my_plugin", r#"{
///     "api": "1.0.0",
///     "name": "my_plugin",
///     "prettyName": "My Plugin",
///     "version": "1.0.0",
///     "author": "...", "url": "...", "license": "...", "copyright": "...",
///     "dependencies": []
/// }"#);
/// ```
#[macro_export]
macro_rules! declare_plugin {
    ($plugin:ty, $name:literal, $metadata:literal) => {
        #[doc(hidden)]
        #[no_mangle]
        pub static plugkit_name: $crate::abi::SymbolStr =
            $crate::abi::SymbolStr::from_static(concat!($name, "\0"));

        #[doc(hidden)]
        #[no_mangle]
        pub static plugkit_metadata: $crate::abi::SymbolStr =
            $crate::abi::SymbolStr::from_static(concat!($metadata, "\0"));

        #[doc(hidden)]
        #[no_mangle]
        pub unsafe extern "C" fn plugkit_create_plugin(
            router: $crate::abi::RouterFn,
            deps: *const *const $crate::abi::PluginHandle,
            dep_count: usize,
        ) -> *mut $crate::abi::PluginHandle {
            $crate::abi::export_plugin::<$plugin>($name, $metadata, router, deps, dep_count)
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;

    unsafe extern "C" fn dummy_router(
        _sender: *const c_char,
        _code: u16,
        _data: *mut *mut c_void,
        _data_size: *mut u32,
    ) -> u16 {
        Reply::Success.code()
    }

    struct Probe {
        ctx: PluginContext,
        loaded_calls: u32,
        unloaded_calls: u32,
    }

    impl Plugin for Probe {
        fn create(ctx: PluginContext) -> Self {
            Self {
                ctx,
                loaded_calls: 0,
                unloaded_calls: 0,
            }
        }

        fn loaded(&mut self) {
            self.loaded_calls += 1;
        }

        fn about_to_be_unloaded(&mut self) {
            self.unloaded_calls += 1;
        }

        fn handle_request(
            &mut self,
            _sender: &str,
            code: u16,
            _data: *mut *mut c_void,
            _data_size: *mut u32,
        ) -> u16 {
            let _ = &self.ctx;
            if code == USER_REQUEST_BASE {
                Reply::Success.code()
            } else {
                Reply::UnknownRequest.code()
            }
        }
    }

    #[test]
    fn test_request_code_round_trip() {
        for code in 0..7 {
            let request = Request::from_code(code).unwrap();
            assert_eq!(request.code(), code);
        }
        assert_eq!(Request::from_code(7), None);
        assert_eq!(Request::from_code(USER_REQUEST_BASE), None);
    }

    #[test]
    fn test_reply_codes_are_stable() {
        assert_eq!(Reply::Success.code(), 0);
        assert_eq!(Reply::CommonError.code(), 1);
        assert_eq!(Reply::True.code(), 2);
        assert_eq!(Reply::False.code(), 3);
        assert_eq!(Reply::UnknownRequest.code(), 4);
        assert_eq!(Reply::DataSizeNull.code(), 5);
        assert_eq!(Reply::NotADependency.code(), 6);
        assert_eq!(Reply::NotFound.code(), 7);
    }

    #[test]
    fn test_c_string_folds_interior_nul() {
        assert_eq!(c_string("with\0nul").as_bytes(), b"");
        assert_eq!(c_string("clean").as_bytes(), b"clean");
    }

    #[test]
    fn test_symbol_str_points_at_nul_terminated_text() {
        static SYM: SymbolStr = SymbolStr::from_static("plugin_x\0");
        let text = unsafe { CStr::from_ptr(SYM.as_ptr()) };
        assert_eq!(text.to_str().unwrap(), "plugin_x");
    }

    #[test]
    fn test_plugin_info_raw_round_trip() {
        let info = PluginInfo {
            name: "plugin_a".into(),
            pretty_name: "Plugin A".into(),
            version: Version::new(1, 2, 3),
            author: "Someone".into(),
            url: "https://example.com".into(),
            license: "MIT".into(),
            copyright: "(c) Someone".into(),
            dependencies: vec![crate::metadata::Dependency {
                name: "plugin_b".into(),
                version: Version::new(1, 0, 0),
            }],
        };

        let raw = Box::into_raw(Box::new(PluginInfoRaw::from_info(&info)));
        unsafe {
            assert_eq!(CStr::from_ptr((*raw).name).to_str().unwrap(), "plugin_a");
            assert_eq!(CStr::from_ptr((*raw).version).to_str().unwrap(), "1.2.3");
            assert_eq!((*raw).dependencies_len, 1);
            let dep = &*(*raw).dependencies;
            assert_eq!(CStr::from_ptr(dep.name).to_str().unwrap(), "plugin_b");
            assert_eq!(CStr::from_ptr(dep.version).to_str().unwrap(), "1.0.0");
            PluginInfoRaw::free(raw);
        }
    }

    #[test]
    fn test_plugin_info_raw_empty_dependencies() {
        let info = PluginInfo {
            name: "solo".into(),
            pretty_name: "Solo".into(),
            version: Version::new(1, 0, 0),
            author: String::new(),
            url: String::new(),
            license: String::new(),
            copyright: String::new(),
            dependencies: Vec::new(),
        };

        let raw = Box::into_raw(Box::new(PluginInfoRaw::from_info(&info)));
        unsafe {
            assert!((*raw).dependencies.is_null());
            assert_eq!((*raw).dependencies_len, 0);
            PluginInfoRaw::free(raw);
        }
    }

    #[test]
    fn test_dependency_names_follow_declaration_order() {
        let metadata = r#"{
            "dependencies": [
                {"name": "b", "version": "1.0.0"},
                {"name": "a", "version": "1.0.0"}
            ]
        }"#;
        assert_eq!(dependency_names(metadata), vec!["b", "a"]);
        assert!(dependency_names("not json").is_empty());
        assert!(dependency_names("{}").is_empty());
    }

    #[test]
    fn test_send_to_undeclared_peer_is_rejected() {
        let ctx = PluginContext {
            name: c_string("sender"),
            router: dummy_router,
            peers: Vec::new(),
        };
        let mut data = std::ptr::null_mut();
        let mut size = 0u32;
        assert_eq!(
            ctx.send_to_peer("stranger", USER_REQUEST_BASE, &mut data, &mut size),
            Reply::NotADependency.code()
        );
    }

    #[test]
    fn test_exported_handle_drives_plugin_hooks() {
        let handle =
            unsafe { export_plugin::<Probe>("probe", "{}", dummy_router, std::ptr::null(), 0) };
        assert!(!handle.is_null());

        unsafe {
            let h = &*handle;
            (h.loaded)(h.state);
            (h.about_to_be_unloaded)(h.state);

            let probe = &*(h.state as *mut Probe);
            assert_eq!(probe.loaded_calls, 1);
            assert_eq!(probe.unloaded_calls, 1);

            let mut data = std::ptr::null_mut();
            let mut size = 0u32;
            let sender = c_string("other");
            assert_eq!(
                (h.handle_request)(
                    h.state,
                    sender.as_ptr(),
                    USER_REQUEST_BASE,
                    &mut data,
                    &mut size
                ),
                Reply::Success.code()
            );

            (h.destroy)(handle);
        }
    }

    #[test]
    fn test_peer_send_reaches_dependency_handle() {
        let dep_handle =
            unsafe { export_plugin::<Probe>("dep", "{}", dummy_router, std::ptr::null(), 0) };

        let ctx = PluginContext {
            name: c_string("sender"),
            router: dummy_router,
            peers: vec![("dep".to_string(), dep_handle as *const PluginHandle)],
        };

        let mut data = std::ptr::null_mut();
        let mut size = 0u32;
        assert_eq!(
            ctx.send_to_peer("dep", USER_REQUEST_BASE, &mut data, &mut size),
            Reply::Success.code()
        );
        assert_eq!(
            ctx.send_to_peer("dep", USER_REQUEST_BASE + 1, &mut data, &mut size),
            Reply::UnknownRequest.code()
        );

        unsafe {
            let h = &*dep_handle;
            (h.destroy)(dep_handle);
        }
    }
}
