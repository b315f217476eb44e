//! Raw libwayland layouts and the next definitions of the shadowed functions

#![allow(non_camel_case_types, missing_docs)]

use std::ffi::{c_char, c_int, c_uint, c_void, CStr};

use wayland_sys::client::{wl_display, wl_proxy};
use wayland_sys::common::{wl_argument, wl_interface};

use crate::interpose::NextSymbol;
use crate::toolkit::theme::CursorImageHeader;
use crate::utils::{DisplayHandle, ObjectHandle};

/// `WL_MARSHAL_FLAG_DESTROY`
pub const WL_MARSHAL_FLAG_DESTROY: u32 = 1;

/// `wl_registry.bind`
pub const WL_REGISTRY_BIND: u32 = 0;

/// Opaque `wl_cursor_theme`
#[derive(Debug)]
pub enum wl_cursor_theme {}

/// Opaque `wl_buffer`
#[derive(Debug)]
pub enum wl_buffer {}

/// libwayland-cursor's `wl_cursor`
#[repr(C)]
#[derive(Debug)]
pub struct wl_cursor {
    pub image_count: c_uint,
    pub images: *mut *mut CursorImageHeader,
    pub name: *const c_char,
}

// libwayland-client keeps these private. Only the leading fields are mirrored, and only read.
#[repr(C)]
#[allow(dead_code)]
struct wl_object {
    interface: *const wl_interface,
    implementation: *const c_void,
    id: u32,
}

#[repr(C)]
#[allow(dead_code)]
struct wl_proxy_header {
    object: wl_object,
    display: *mut wl_display,
}

/// The `wl_display` a proxy belongs to
///
/// # Safety
///
/// `proxy` must be a live libwayland-client proxy.
pub unsafe fn proxy_display(proxy: ObjectHandle) -> DisplayHandle {
    let header = proxy.as_ptr::<wl_proxy_header>();
    DisplayHandle::from_raw((*header).display as usize)
}

/// The interface name of a proxy, as `wl_proxy_get_class` reports it
///
/// # Safety
///
/// `proxy` must be a live libwayland-client proxy.
pub unsafe fn proxy_class<'a>(proxy: *mut wl_proxy) -> &'a [u8] {
    let class = NEXT_PROXY_GET_CLASS.get()(proxy);
    if class.is_null() {
        return &[];
    }
    CStr::from_ptr(class).to_bytes()
}

/// `wl_registry_listener`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct wl_registry_listener {
    pub global: Option<
        unsafe extern "C" fn(
            data: *mut c_void,
            registry: *mut wl_proxy,
            name: u32,
            interface: *const c_char,
            version: u32,
        ),
    >,
    pub global_remove:
        Option<unsafe extern "C" fn(data: *mut c_void, registry: *mut wl_proxy, name: u32)>,
}

pub type MarshalArrayFlagsFn = unsafe extern "C" fn(
    proxy: *mut wl_proxy,
    opcode: u32,
    interface: *const wl_interface,
    version: u32,
    flags: u32,
    args: *mut wl_argument,
) -> *mut wl_proxy;
pub type AddListenerFn = unsafe extern "C" fn(
    proxy: *mut wl_proxy,
    implementation: *mut Option<unsafe extern "C" fn()>,
    data: *mut c_void,
) -> c_int;
pub type ProxyDestroyFn = unsafe extern "C" fn(proxy: *mut wl_proxy);
pub type DisplayDisconnectFn = unsafe extern "C" fn(display: *mut wl_display);
pub type ProxyGetClassFn = unsafe extern "C" fn(proxy: *mut wl_proxy) -> *const c_char;
pub type ProxyGetVersionFn = unsafe extern "C" fn(proxy: *mut wl_proxy) -> u32;
pub type ThemeGetCursorFn =
    unsafe extern "C" fn(theme: *mut wl_cursor_theme, name: *const c_char) -> *mut wl_cursor;
pub type ImageGetBufferFn = unsafe extern "C" fn(image: *mut CursorImageHeader) -> *mut wl_buffer;
pub type GtkInitFn = unsafe extern "C" fn(a: *mut c_void, b: *mut c_void);
pub type ApplicationRunFn =
    unsafe extern "C" fn(app: *mut c_void, argc: c_int, argv: *mut *mut c_char) -> c_int;

pub static NEXT_MARSHAL_ARRAY_FLAGS: NextSymbol<MarshalArrayFlagsFn> =
    unsafe { NextSymbol::new(c"wl_proxy_marshal_array_flags") };
pub static NEXT_ADD_LISTENER: NextSymbol<AddListenerFn> =
    unsafe { NextSymbol::new(c"wl_proxy_add_listener") };
pub static NEXT_PROXY_DESTROY: NextSymbol<ProxyDestroyFn> =
    unsafe { NextSymbol::new(c"wl_proxy_destroy") };
pub static NEXT_DISPLAY_DISCONNECT: NextSymbol<DisplayDisconnectFn> =
    unsafe { NextSymbol::new(c"wl_display_disconnect") };
pub static NEXT_PROXY_GET_CLASS: NextSymbol<ProxyGetClassFn> =
    unsafe { NextSymbol::new(c"wl_proxy_get_class") };
pub static NEXT_PROXY_GET_VERSION: NextSymbol<ProxyGetVersionFn> =
    unsafe { NextSymbol::new(c"wl_proxy_get_version") };
pub static NEXT_THEME_GET_CURSOR: NextSymbol<ThemeGetCursorFn> =
    unsafe { NextSymbol::new(c"wl_cursor_theme_get_cursor") };
pub static NEXT_IMAGE_GET_BUFFER: NextSymbol<ImageGetBufferFn> =
    unsafe { NextSymbol::new(c"wl_cursor_image_get_buffer") };
#[cfg(feature = "toolkit_fallback")]
pub static NEXT_GTK_INIT: NextSymbol<GtkInitFn> = unsafe { NextSymbol::new(c"gtk_init") };
#[cfg(feature = "toolkit_fallback")]
pub static NEXT_APPLICATION_RUN: NextSymbol<ApplicationRunFn> =
    unsafe { NextSymbol::new(c"g_application_run") };

/// Builds a `wl_argument` holding an unsigned integer
pub fn arg_uint(u: u32) -> wl_argument {
    wl_argument { u }
}

/// Builds a `wl_argument` holding a signed integer
pub fn arg_int(i: i32) -> wl_argument {
    wl_argument { i }
}

/// Builds a `wl_argument` holding an object, or null
pub fn arg_object(object: Option<ObjectHandle>) -> wl_argument {
    wl_argument {
        o: object.map_or(std::ptr::null_mut(), |object| object.as_ptr::<c_void>()) as *const _,
    }
}

/// Builds a `wl_argument` holding a string
pub fn arg_str(s: *const c_char) -> wl_argument {
    wl_argument { s }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_read_after_the_object_header() {
        let display = 0xd15usize as *mut wl_display;
        let mut header = wl_proxy_header {
            object: wl_object {
                interface: std::ptr::null(),
                implementation: std::ptr::null(),
                id: 3,
            },
            display,
        };
        let proxy = ObjectHandle::from_ptr(&mut header as *mut wl_proxy_header).unwrap();
        assert_eq!(unsafe { proxy_display(proxy) }, DisplayHandle::from_raw(0xd15));
        assert_eq!(header.object.id, 3);
    }
}
