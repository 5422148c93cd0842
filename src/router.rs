//! Manager-side request routing.
//!
//! The [`handle_request`] entry point is the [`RouterFn`](crate::abi::RouterFn)
//! handed to every plug-in factory. Peer-to-peer traffic never reaches it:
//! a plug-in dispatches to its declared dependencies directly (see
//! [`PluginContext::send_to_peer`](crate::abi::PluginContext::send_to_peer));
//! the router serves only manager-directed requests.
//!
//! Routing is a typed core ([`route`]) producing one tagged payload
//! variant per request code; the `extern "C"` shim materializes the
//! payload into the caller's slots. All payload allocations transfer to
//! the caller (`abi::free_string`, `abi::free_count`,
//! `PluginInfoRaw::free`).

use std::ffi::{c_char, c_void, CStr};

use tracing::debug;

use crate::abi::{self, PluginInfoRaw, Reply, Request};
use crate::manager::PluginManager;
use crate::metadata::{PluginInfo, PLUGIN_API};

/// Typed payload produced by the routing core.
pub(crate) enum RouterPayload {
    None,
    Text(String),
    Count(u64),
    Info(PluginInfo),
}

/// Resolve a manager-directed request against `manager`.
///
/// `argument` is the decoded in-payload for the requests that take one;
/// `sender` substitutes for a missing argument where the request allows
/// it (info and version lookups).
pub(crate) fn route(
    manager: &PluginManager,
    sender: Option<&str>,
    code: u16,
    argument: Option<&str>,
) -> (Reply, RouterPayload) {
    let Some(request) = Request::from_code(code) else {
        // Codes >= USER_REQUEST_BASE belong to plug-in protocols and are
        // not the manager's to answer.
        return (Reply::UnknownRequest, RouterPayload::None);
    };

    match request {
        Request::GetAppDirectory => (
            Reply::Success,
            RouterPayload::Text(PluginManager::app_directory().display().to_string()),
        ),
        Request::GetPluginApi => (Reply::Success, RouterPayload::Text(PLUGIN_API.to_string())),
        Request::GetPluginsCount => (
            Reply::Success,
            RouterPayload::Count(manager.plugin_count() as u64),
        ),
        Request::GetPluginInfo => {
            let Some(name) = argument.or(sender) else {
                return (Reply::CommonError, RouterPayload::None);
            };
            match manager.plugin_info(name) {
                Some(info) => (Reply::Success, RouterPayload::Info(info)),
                None => (Reply::NotFound, RouterPayload::None),
            }
        }
        Request::GetPluginVersion => {
            let Some(name) = argument.or(sender) else {
                return (Reply::CommonError, RouterPayload::None);
            };
            match manager.plugin_info(name) {
                Some(info) => (Reply::Success, RouterPayload::Text(info.version.to_string())),
                None => (Reply::NotFound, RouterPayload::None),
            }
        }
        Request::CheckPlugin => {
            let Some(name) = argument else {
                return (Reply::CommonError, RouterPayload::None);
            };
            let reply = if manager.has_plugin(name) {
                Reply::True
            } else {
                Reply::False
            };
            (reply, RouterPayload::None)
        }
        Request::CheckPluginLoaded => {
            let Some(name) = argument else {
                return (Reply::CommonError, RouterPayload::None);
            };
            let reply = if manager.is_plugin_loaded(name) {
                Reply::True
            } else {
                Reply::False
            };
            (reply, RouterPayload::None)
        }
    }
}

// Requests whose in-payload is a plug-in name.
fn takes_argument(code: u16) -> bool {
    matches!(
        Request::from_code(code),
        Some(
            Request::GetPluginInfo
                | Request::GetPluginVersion
                | Request::CheckPlugin
                | Request::CheckPluginLoaded
        )
    )
}

/// Shim shared by [`handle_request`] and the tests: decode the slots,
/// route, materialize the payload.
///
/// # Safety
/// `sender`, `data` and `data_size` must each be null or valid for the
/// access the request implies; a non-null `*data` for an argument-taking
/// request must point at a NUL-terminated string.
pub(crate) unsafe fn dispatch(
    manager: &PluginManager,
    sender: *const c_char,
    code: u16,
    data: *mut *mut c_void,
    data_size: *mut u32,
) -> u16 {
    let sender_name = if sender.is_null() {
        None
    } else {
        CStr::from_ptr(sender).to_str().ok()
    };
    debug!(sender = sender_name.unwrap_or("?"), code, "plugin request");

    // Every manager request reads or writes payload bytes; a null size
    // slot is rejected before any side effect.
    if data_size.is_null() {
        return Reply::DataSizeNull.code();
    }

    // The payload slot is only read for requests that document an
    // in-payload; for the others its content is unspecified.
    let argument: Option<String> = if takes_argument(code) && !data.is_null() && !(*data).is_null()
    {
        CStr::from_ptr(*data as *const c_char)
            .to_str()
            .ok()
            .map(str::to_string)
    } else {
        None
    };

    let (reply, payload) = route(manager, sender_name, code, argument.as_deref());

    match payload {
        RouterPayload::None => {
            *data_size = 0;
        }
        _ if data.is_null() => return Reply::CommonError.code(),
        RouterPayload::Text(text) => {
            let text = abi::c_string(&text);
            *data_size = text.as_bytes().len() as u32;
            *data = text.into_raw() as *mut c_void;
        }
        RouterPayload::Count(count) => {
            *data = Box::into_raw(Box::new(count)) as *mut c_void;
            *data_size = std::mem::size_of::<u64>() as u32;
        }
        RouterPayload::Info(info) => {
            *data = Box::into_raw(Box::new(PluginInfoRaw::from_info(&info))) as *mut c_void;
            *data_size = std::mem::size_of::<PluginInfoRaw>() as u32;
        }
    }

    reply.code()
}

/// The router handed to every plug-in at construction.
///
/// Routes to the process-wide [`PluginManager::instance`]. Not safe to
/// call from plug-in-spawned threads while `load`/`unload` is in
/// progress.
pub(crate) unsafe extern "C" fn handle_request(
    sender: *const c_char,
    code: u16,
    data: *mut *mut c_void,
    data_size: *mut u32,
) -> u16 {
    dispatch(PluginManager::instance(), sender, code, data, data_size)
}
