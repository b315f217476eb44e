//! `wp_cursor_shape_v1` interface descriptions for libwayland-client
//!
//! Only the requests are described, neither interface has events.

use std::ffi::CStr;
use std::ptr;

use wayland_sys::common::{wl_interface, wl_message};

/// `wp_cursor_shape_manager_v1` interface name
pub const MANAGER_INTERFACE_NAME: &CStr = c"wp_cursor_shape_manager_v1";
/// `wp_cursor_shape_device_v1` interface name
pub const DEVICE_INTERFACE_NAME: &CStr = c"wp_cursor_shape_device_v1";

/// Highest manager version the shim speaks
pub const MANAGER_VERSION: u32 = 1;

/// `wp_cursor_shape_manager_v1.destroy`
pub const MANAGER_DESTROY: u32 = 0;
/// `wp_cursor_shape_manager_v1.get_pointer`
pub const MANAGER_GET_POINTER: u32 = 1;
/// `wp_cursor_shape_manager_v1.get_tablet_tool_v2`
pub const MANAGER_GET_TABLET_TOOL_V2: u32 = 2;
/// `wp_cursor_shape_device_v1.destroy`
pub const DEVICE_DESTROY: u32 = 0;
/// `wp_cursor_shape_device_v1.set_shape`
pub const DEVICE_SET_SHAPE: u32 = 1;

#[repr(transparent)]
struct SyncWrapper<T>(T);

// SAFETY: the wrapped descriptions are immutable and only hold pointers to other statics
unsafe impl<T> Sync for SyncWrapper<T> {}

static NO_TYPES: SyncWrapper<[*const wl_interface; 2]> = SyncWrapper([ptr::null(), ptr::null()]);
static NEW_DEVICE_TYPES: SyncWrapper<[*const wl_interface; 2]> =
    SyncWrapper([&DEVICE_INTERFACE.0 as *const wl_interface, ptr::null()]);

static MANAGER_REQUESTS: SyncWrapper<[wl_message; 3]> = SyncWrapper([
    wl_message {
        name: c"destroy".as_ptr(),
        signature: c"".as_ptr(),
        types: NO_TYPES.0.as_ptr(),
    },
    wl_message {
        name: c"get_pointer".as_ptr(),
        signature: c"no".as_ptr(),
        types: NEW_DEVICE_TYPES.0.as_ptr(),
    },
    wl_message {
        name: c"get_tablet_tool_v2".as_ptr(),
        signature: c"no".as_ptr(),
        types: NEW_DEVICE_TYPES.0.as_ptr(),
    },
]);

static DEVICE_REQUESTS: SyncWrapper<[wl_message; 2]> = SyncWrapper([
    wl_message {
        name: c"destroy".as_ptr(),
        signature: c"".as_ptr(),
        types: NO_TYPES.0.as_ptr(),
    },
    wl_message {
        name: c"set_shape".as_ptr(),
        signature: c"uu".as_ptr(),
        types: NO_TYPES.0.as_ptr(),
    },
]);

static MANAGER_INTERFACE: SyncWrapper<wl_interface> = SyncWrapper(wl_interface {
    name: MANAGER_INTERFACE_NAME.as_ptr(),
    version: 1,
    request_count: 3,
    requests: MANAGER_REQUESTS.0.as_ptr(),
    event_count: 0,
    events: ptr::null(),
});

static DEVICE_INTERFACE: SyncWrapper<wl_interface> = SyncWrapper(wl_interface {
    name: DEVICE_INTERFACE_NAME.as_ptr(),
    version: 1,
    request_count: 2,
    requests: DEVICE_REQUESTS.0.as_ptr(),
    event_count: 0,
    events: ptr::null(),
});

/// The `wp_cursor_shape_manager_v1` interface
pub fn manager_interface() -> *const wl_interface {
    &MANAGER_INTERFACE.0
}

/// The `wp_cursor_shape_device_v1` interface
pub fn device_interface() -> *const wl_interface {
    &DEVICE_INTERFACE.0
}

#[cfg(test)]
mod tests {
    use super::*;

    type Message = (&'static CStr, &'static CStr, *const *const wl_interface);

    unsafe fn request(interface: *const wl_interface, opcode: u32) -> Message {
        let message = &*(*interface).requests.add(opcode as usize);
        (
            CStr::from_ptr(message.name),
            CStr::from_ptr(message.signature),
            message.types,
        )
    }

    #[test]
    fn manager_requests() {
        unsafe {
            let manager = manager_interface();
            assert_eq!(CStr::from_ptr((*manager).name), MANAGER_INTERFACE_NAME);
            assert_eq!((*manager).request_count, 3);

            let (name, signature, _) = request(manager, MANAGER_DESTROY);
            assert_eq!((name, signature), (c"destroy", c""));

            for opcode in [MANAGER_GET_POINTER, MANAGER_GET_TABLET_TOOL_V2] {
                let (_, signature, types) = request(manager, opcode);
                assert_eq!(signature, c"no");
                // the new object is a shape device, the pointer or tool is untyped
                assert_eq!(*types, device_interface());
                assert!((*types.add(1)).is_null());
            }
        }
    }

    #[test]
    fn device_requests() {
        unsafe {
            let device = device_interface();
            assert_eq!(CStr::from_ptr((*device).name), DEVICE_INTERFACE_NAME);
            assert_eq!((*device).event_count, 0);

            let (name, signature, _) = request(device, DEVICE_SET_SHAPE);
            assert_eq!((name, signature), (c"set_shape", c"uu"));
            let (name, _, _) = request(device, DEVICE_DESTROY);
            assert_eq!(name, c"destroy");
        }
    }
}
