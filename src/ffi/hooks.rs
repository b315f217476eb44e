//! The exported entry points
//!
//! Each hook builds the shared state before it resolves the definition it shadows. Its own work
//! runs inside `catch_unwind` and it always ends by calling through. A panic in the shim is
//! logged and the call goes through unchanged.

use std::ffi::{c_char, c_int, c_void, CStr};
use std::panic::AssertUnwindSafe;
use std::ptr;

use tracing::{debug, error, warn};
use wayland_sys::client::{wl_display, wl_proxy};
use wayland_sys::common::{wl_argument, wl_interface};

use super::backend::LibWayland;
use super::protocol::{manager_interface, MANAGER_INTERFACE_NAME, MANAGER_VERSION};
use super::sys::{
    arg_object, arg_str, arg_uint, proxy_class, proxy_display, wl_cursor, wl_cursor_theme,
    wl_registry_listener, NEXT_ADD_LISTENER, NEXT_DISPLAY_DISCONNECT, NEXT_IMAGE_GET_BUFFER,
    NEXT_MARSHAL_ARRAY_FLAGS, NEXT_PROXY_DESTROY, NEXT_THEME_GET_CURSOR, WL_MARSHAL_FLAG_DESTROY,
    WL_REGISTRY_BIND,
};
use crate::cache::ShapeDeviceFactory;
use crate::shape::SHAPE_REGISTRY;
use crate::state::{state, ShimState};
use crate::translate::{
    classify, PendingCursorSet, Request, RequestKind, SurfaceRequest, Translator, Verdict,
};
use crate::utils::{BufferHandle, DisplayHandle, ManagerHandle, ObjectHandle};

fn guarded<T>(hook: &'static str, f: impl FnOnce() -> T) -> Option<T> {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(_) => {
            error!(hook, "Panic inside hook, passing the call through");
            None
        }
    }
}

fn enabled(state: &ShimState) -> bool {
    !state.config.disabled
}

// Reduces a marshalled request to what the translator looks at. `args` holds the request's
// leading arguments, set_cursor needs four and attach one.
unsafe fn decode_args(
    kind: RequestKind,
    object: ObjectHandle,
    version: u32,
    args: &[wl_argument],
) -> Request {
    let surface_request = |request| Request::Surface {
        surface: object,
        request,
    };
    match (kind, args) {
        (RequestKind::SetCursor(kind), [serial, surface, hotspot_x, hotspot_y, ..]) => {
            Request::SetCursor(PendingCursorSet {
                device: object,
                kind,
                version,
                serial: serial.u,
                surface: ObjectHandle::from_ptr(surface.o),
                hotspot_x: hotspot_x.i,
                hotspot_y: hotspot_y.i,
            })
        }
        (RequestKind::SetCursor(_), _) => Request::Other,
        (RequestKind::Attach, [buffer, ..]) => {
            surface_request(SurfaceRequest::Attach(BufferHandle::from_ptr(buffer.o)))
        }
        (RequestKind::Attach, []) => surface_request(SurfaceRequest::Other),
        (RequestKind::SetBufferScale, _) => surface_request(SurfaceRequest::SetBufferScale),
        (RequestKind::Damage, _) => surface_request(SurfaceRequest::Damage),
        (RequestKind::Commit, _) => surface_request(SurfaceRequest::Commit),
        (RequestKind::OtherSurface, _) => surface_request(SurfaceRequest::Other),
        (RequestKind::Other, _) => Request::Other,
    }
}

unsafe fn decode(proxy: *mut wl_proxy, opcode: u32, version: u32, args: *const wl_argument) -> Request {
    let object = ObjectHandle::from_raw(proxy as usize);
    let kind = classify(proxy_class(proxy), opcode);
    let len = match kind {
        RequestKind::SetCursor(_) => 4,
        RequestKind::Attach => 1,
        _ => 0,
    };
    let args = if args.is_null() || len == 0 {
        &[][..]
    } else {
        std::slice::from_raw_parts(args, len)
    };
    decode_args(kind, object, version, args)
}

// Drops cache entries of a proxy that is going away, destroying its shape device.
fn forget_proxy(state: &ShimState, proxy: *mut wl_proxy) {
    let object = ObjectHandle::from_raw(proxy as usize);
    let backend = LibWayland::new(state);
    Translator::new(&state.caches, &backend).release_object(object);
    if let Some(device) = state.caches.forget_object(object) {
        debug!(?object, ?device, "Destroying shape device of destroyed proxy");
        backend.destroy_shape_device(device);
    }
}

/// # Safety
///
/// Called by libwayland-client and applications with its usual contract.
#[no_mangle]
pub unsafe extern "C" fn wl_proxy_marshal_array_flags(
    proxy: *mut wl_proxy,
    opcode: u32,
    interface: *const wl_interface,
    version: u32,
    flags: u32,
    args: *mut wl_argument,
) -> *mut wl_proxy {
    let state = state();
    let next = NEXT_MARSHAL_ARRAY_FLAGS.get();
    if !enabled(state) || proxy.is_null() {
        return next(proxy, opcode, interface, version, flags, args);
    }

    let verdict = guarded("wl_proxy_marshal_array_flags", || {
        let request = decode(proxy, opcode, version, args);
        let backend = LibWayland::new(state);
        Translator::new(&state.caches, &backend).intercept(&request)
    })
    .unwrap_or(Verdict::Forward);
    if verdict == Verdict::Suppress {
        return ptr::null_mut();
    }

    if flags & WL_MARSHAL_FLAG_DESTROY != 0 {
        guarded("wl_proxy_marshal_array_flags", || forget_proxy(state, proxy));
    }
    next(proxy, opcode, interface, version, flags, args)
}

/// # Safety
///
/// Called by applications with libwayland-cursor's usual contract.
#[no_mangle]
pub unsafe extern "C" fn wl_cursor_theme_get_cursor(
    theme: *mut wl_cursor_theme,
    name: *const c_char,
) -> *mut wl_cursor {
    let state = state();
    let cursor = NEXT_THEME_GET_CURSOR.get()(theme, name);
    if !enabled(state) || cursor.is_null() || name.is_null() {
        return cursor;
    }

    guarded("wl_cursor_theme_get_cursor", || {
        let Ok(name) = CStr::from_ptr(name).to_str() else {
            return;
        };
        let cursor = &*cursor;
        if cursor.images.is_null() {
            return;
        }
        // Fetching a buffer may create it, which goes through the marshalling hook. Collect them
        // before the caches are locked.
        let get_buffer = NEXT_IMAGE_GET_BUFFER.get();
        let buffers: Vec<BufferHandle> = (0..cursor.image_count as usize)
            .map(|i| *cursor.images.add(i))
            .filter(|image| !image.is_null())
            .filter_map(|image| BufferHandle::from_ptr(get_buffer(image)))
            .collect();
        state.caches.register_cursor_buffers(&SHAPE_REGISTRY, name, buffers);
    });
    cursor
}

struct RegistryHook {
    data: *mut c_void,
    listener: *const wl_registry_listener,
}

static REGISTRY_LISTENER: wl_registry_listener = wl_registry_listener {
    global: Some(registry_global),
    global_remove: Some(registry_global_remove),
};

unsafe extern "C" fn registry_global(
    data: *mut c_void,
    registry: *mut wl_proxy,
    name: u32,
    interface: *const c_char,
    version: u32,
) {
    let hook = &*(data as *const RegistryHook);
    if let Some(global) = (*hook.listener).global {
        global(hook.data, registry, name, interface, version);
    }
    if interface.is_null() || CStr::from_ptr(interface) != MANAGER_INTERFACE_NAME {
        return;
    }
    guarded("wl_registry.global", || bind_shape_manager(registry, name, version));
}

unsafe extern "C" fn registry_global_remove(data: *mut c_void, registry: *mut wl_proxy, name: u32) {
    let hook = &*(data as *const RegistryHook);
    if let Some(global_remove) = (*hook.listener).global_remove {
        global_remove(hook.data, registry, name);
    }
}

unsafe fn bind_shape_manager(registry: *mut wl_proxy, name: u32, version: u32) {
    let state = state();
    let version = version.min(MANAGER_VERSION);
    let mut args = [
        arg_uint(name),
        arg_str(MANAGER_INTERFACE_NAME.as_ptr()),
        arg_uint(version),
        arg_object(None),
    ];
    let proxy = NEXT_MARSHAL_ARRAY_FLAGS.get()(
        registry,
        WL_REGISTRY_BIND,
        manager_interface(),
        version,
        0,
        args.as_mut_ptr(),
    );
    let Some(manager) = ManagerHandle::from_ptr(proxy) else {
        warn!(name, "Failed to bind wp_cursor_shape_manager_v1");
        return;
    };

    let wl_display = proxy_display(ObjectHandle::from_raw(registry as usize));
    if state.caches.adopt_shape_manager(wl_display, manager, &LibWayland::new(state)) {
        debug!(?wl_display, ?manager, version, "Bound wp_cursor_shape_manager_v1");
    }
}

/// # Safety
///
/// Called by libwayland-client and applications with its usual contract.
#[no_mangle]
pub unsafe extern "C" fn wl_proxy_add_listener(
    proxy: *mut wl_proxy,
    implementation: *mut Option<unsafe extern "C" fn()>,
    data: *mut c_void,
) -> c_int {
    let state = state();
    let next = NEXT_ADD_LISTENER.get();
    if !enabled(state) || proxy.is_null() || implementation.is_null() {
        return next(proxy, implementation, data);
    }

    let wrapped = guarded("wl_proxy_add_listener", || {
        if proxy_class(proxy) != b"wl_registry" {
            return None;
        }
        if state.toolkit.capture_display(data) {
            debug!(registry = ?proxy, "Registry listener belongs to the toolkit display");
        }
        // Lives as long as the registry, which never hands its listener back
        let hook = Box::into_raw(Box::new(RegistryHook {
            data,
            listener: implementation as *const wl_registry_listener,
        }));
        debug!(registry = ?proxy, "Wrapping wl_registry listener");
        Some(hook)
    })
    .flatten();

    match wrapped {
        Some(hook) => next(
            proxy,
            &REGISTRY_LISTENER as *const wl_registry_listener
                as *mut Option<unsafe extern "C" fn()>,
            hook as *mut c_void,
        ),
        None => next(proxy, implementation, data),
    }
}

/// # Safety
///
/// Called by libwayland-client and applications with its usual contract.
#[no_mangle]
pub unsafe extern "C" fn wl_proxy_destroy(proxy: *mut wl_proxy) {
    let state = state();
    let next = NEXT_PROXY_DESTROY.get();
    if enabled(state) && !proxy.is_null() {
        guarded("wl_proxy_destroy", || forget_proxy(state, proxy));
    }
    next(proxy)
}

/// # Safety
///
/// Called by applications with libwayland-client's usual contract.
#[no_mangle]
pub unsafe extern "C" fn wl_display_disconnect(display: *mut wl_display) {
    let state = state();
    let next = NEXT_DISPLAY_DISCONNECT.get();
    if enabled(state) && !display.is_null() {
        guarded("wl_display_disconnect", || {
            let wl_display = DisplayHandle::from_raw(display as usize);
            let backend = LibWayland::new(state);
            Translator::new(&state.caches, &backend).discard_display(wl_display);
            state.caches.forget_display(wl_display);
            debug!(?wl_display, "Forgot disconnected display");
        });
    }
    next(display)
}

#[cfg(feature = "toolkit_fallback")]
mod toolkit_hooks {
    use std::ffi::{c_char, c_int, c_void};

    use scopeguard::ScopeGuard;
    use tracing::debug;

    use super::guarded;
    use crate::ffi::sys::{NEXT_APPLICATION_RUN, NEXT_GTK_INIT};
    use crate::state::state;
    use crate::toolkit::ToolkitFallback;

    // Keeps the display capture armed while GTK sets up its connection
    pub(super) fn armed_capture<'a>(
        toolkit: &'a ToolkitFallback,
        arm: impl FnOnce() -> bool,
    ) -> ScopeGuard<&'a ToolkitFallback, impl FnOnce(&'a ToolkitFallback)> {
        if guarded("toolkit init", arm).unwrap_or(false) {
            debug!("Armed GdkWaylandDisplay capture");
        }
        scopeguard::guard(toolkit, |toolkit| toolkit.disarm())
    }

    /// # Safety
    ///
    /// Called by applications with GTK's usual contract.
    #[no_mangle]
    pub unsafe extern "C" fn gtk_init(a: *mut c_void, b: *mut c_void) {
        let state = state();
        let next = NEXT_GTK_INIT.get();
        let _capture = armed_capture(&state.toolkit, || state.arm_toolkit_capture());
        next(a, b)
    }

    /// # Safety
    ///
    /// Called by applications with GLib's usual contract.
    #[no_mangle]
    pub unsafe extern "C" fn g_application_run(
        app: *mut c_void,
        argc: c_int,
        argv: *mut *mut c_char,
    ) -> c_int {
        let state = state();
        let next = NEXT_APPLICATION_RUN.get();
        let _capture = armed_capture(&state.toolkit, || state.arm_toolkit_capture());
        next(app, argc, argv)
    }
}
