//! The protocol seam, implemented on libwayland-client
//!
//! Requests issued here go straight to the next `wl_proxy_marshal_array_flags`, so the shim
//! never sees its own traffic.

use std::ptr;

use tracing::{trace, warn};
use wayland_sys::client::wl_proxy;
use wayland_sys::common::{wl_argument, wl_interface};

use super::protocol::{
    device_interface, DEVICE_DESTROY, DEVICE_SET_SHAPE, MANAGER_DESTROY, MANAGER_GET_POINTER,
    MANAGER_GET_TABLET_TOOL_V2,
};
use super::sys::{
    arg_int, arg_object, arg_uint, proxy_display, NEXT_MARSHAL_ARRAY_FLAGS, NEXT_PROXY_GET_VERSION,
    WL_MARSHAL_FLAG_DESTROY,
};
use crate::cache::{DeviceKind, ShapeDeviceFactory};
use crate::shape::Shape;
use crate::state::ShimState;
use crate::translate::{Backend, PendingCursorSet};
use crate::utils::{BufferHandle, DisplayHandle, ManagerHandle, ObjectHandle, ShapeDeviceHandle};

// `set_cursor` has the same opcode on `wl_pointer` and `zwp_tablet_tool_v2`
const SET_CURSOR: u32 = 0;

/// [`Backend`] sending through libwayland-client
#[derive(Debug)]
pub struct LibWayland<'a> {
    state: &'a ShimState,
}

impl<'a> LibWayland<'a> {
    /// Creates a backend resolving toolkit buffers through `state`
    pub fn new(state: &'a ShimState) -> Self {
        LibWayland { state }
    }
}

unsafe fn marshal(
    proxy: *mut wl_proxy,
    opcode: u32,
    interface: *const wl_interface,
    version: u32,
    flags: u32,
    args: &mut [wl_argument],
) -> *mut wl_proxy {
    NEXT_MARSHAL_ARRAY_FLAGS.get()(proxy, opcode, interface, version, flags, args.as_mut_ptr())
}

unsafe fn version(proxy: *mut wl_proxy) -> u32 {
    NEXT_PROXY_GET_VERSION.get()(proxy)
}

impl ShapeDeviceFactory for LibWayland<'_> {
    fn create_shape_device(
        &self,
        manager: ManagerHandle,
        object: ObjectHandle,
        kind: DeviceKind,
    ) -> Option<ShapeDeviceHandle> {
        let opcode = match kind {
            DeviceKind::Pointer => MANAGER_GET_POINTER,
            DeviceKind::TabletTool => MANAGER_GET_TABLET_TOOL_V2,
        };
        let proxy = manager.as_ptr::<wl_proxy>();
        // SAFETY: the manager is live for as long as its display is connected, and `object` is
        // the live proxy the application just sent set_cursor on
        let device = unsafe {
            marshal(
                proxy,
                opcode,
                device_interface(),
                version(proxy),
                0,
                &mut [arg_object(None), arg_object(Some(object))],
            )
        };
        let device = ShapeDeviceHandle::from_ptr(device);
        if device.is_none() {
            warn!(?manager, ?object, ?kind, "Failed to create cursor shape device");
        }
        device
    }

    fn destroy_shape_device(&self, device: ShapeDeviceHandle) {
        trace!(?device, "Destroying cursor shape device");
        let proxy = device.as_ptr::<wl_proxy>();
        // SAFETY: the device was created by the shim and is no longer cached
        unsafe {
            marshal(
                proxy,
                DEVICE_DESTROY,
                ptr::null(),
                version(proxy),
                WL_MARSHAL_FLAG_DESTROY,
                &mut [arg_uint(0)],
            );
        }
    }

    fn destroy_shape_manager(&self, manager: ManagerHandle) {
        trace!(?manager, "Destroying cursor shape manager");
        let proxy = manager.as_ptr::<wl_proxy>();
        // SAFETY: the manager was bound by the shim and lost its registration
        unsafe {
            marshal(
                proxy,
                MANAGER_DESTROY,
                ptr::null(),
                version(proxy),
                WL_MARSHAL_FLAG_DESTROY,
                &mut [arg_uint(0)],
            );
        }
    }
}

impl Backend for LibWayland<'_> {
    fn display_of(&self, object: ObjectHandle) -> DisplayHandle {
        // SAFETY: only called with proxies the application is currently sending requests on
        unsafe { proxy_display(object) }
    }

    fn replay_set_cursor(&self, request: &PendingCursorSet) {
        // SAFETY: the device proxy was live when the request was captured, and the application
        // cannot have destroyed it since, every request of this thread passes through here first
        unsafe {
            marshal(
                request.device.as_ptr(),
                SET_CURSOR,
                ptr::null(),
                request.version,
                0,
                &mut [
                    arg_uint(request.serial),
                    arg_object(request.surface),
                    arg_int(request.hotspot_x),
                    arg_int(request.hotspot_y),
                ],
            );
        }
    }

    fn set_shape(&self, device: ShapeDeviceHandle, serial: u32, shape: Shape) {
        let proxy = device.as_ptr::<wl_proxy>();
        // SAFETY: cached shape devices are live
        unsafe {
            marshal(
                proxy,
                DEVICE_SET_SHAPE,
                ptr::null(),
                version(proxy),
                0,
                &mut [arg_uint(serial), arg_uint(shape.wire_value())],
            );
        }
    }

    fn toolkit_buffer_shape(&self, buffer: BufferHandle) -> Option<Shape> {
        self.state.toolkit_buffer_shape(buffer)
    }
}
