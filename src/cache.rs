//! Identity caches and shape device acquisition
//!
//! Everything the shim learns about foreign objects is kept here, keyed by object identity:
//!
//! - which [`Shape`] a `wl_buffer` shows, learned when a named cursor is loaded,
//! - which `wp_cursor_shape_manager_v1` was bound on a `wl_display`,
//! - which `wp_cursor_shape_device_v1` was created for a `wl_pointer` or `zwp_tablet_tool_v2`.
//!
//! All maps share one lock. The lock is never held while calling into the protocol library,
//! which has locks of its own; creating a shape device happens outside of it and races are
//! resolved afterwards by keeping the first device inserted.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::shape::{Shape, ShapeRegistry};
use crate::utils::{BufferHandle, DisplayHandle, ManagerHandle, ObjectHandle, ShapeDeviceHandle};

/// Kind of input device a cursor is set on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// A `wl_pointer`
    Pointer,
    /// A `zwp_tablet_tool_v2`
    TabletTool,
}

/// Creates and destroys the shim's own protocol objects on behalf of the caches
///
/// Implemented on top of libwayland by the hooks, and by recording fakes in tests.
pub trait ShapeDeviceFactory {
    /// Sends `get_pointer` or `get_tablet_tool_v2` on `manager` for `object`
    fn create_shape_device(
        &self,
        manager: ManagerHandle,
        object: ObjectHandle,
        kind: DeviceKind,
    ) -> Option<ShapeDeviceHandle>;

    /// Sends `wp_cursor_shape_device_v1.destroy`
    fn destroy_shape_device(&self, device: ShapeDeviceHandle);

    /// Sends `wp_cursor_shape_manager_v1.destroy`
    fn destroy_shape_manager(&self, manager: ManagerHandle);
}

#[derive(Debug, Clone, Copy)]
struct DeviceEntry {
    display: DisplayHandle,
    device: ShapeDeviceHandle,
}

#[derive(Debug, Default)]
struct Maps {
    buffers: HashMap<BufferHandle, Shape>,
    managers: HashMap<DisplayHandle, ManagerHandle>,
    devices: HashMap<ObjectHandle, DeviceEntry>,
}

/// The process-wide identity caches
#[derive(Debug, Default)]
pub struct IdentityCaches {
    maps: Mutex<Maps>,
}

impl IdentityCaches {
    /// Creates empty caches
    pub fn new() -> IdentityCaches {
        IdentityCaches::default()
    }

    // A panic while holding the lock cannot leave the maps half-updated, every critical section
    // is a single insert or remove.
    fn lock(&self) -> MutexGuard<'_, Maps> {
        self.maps.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remembers that `buffer` shows `shape`
    ///
    /// The first registration of a buffer is authoritative, later ones are ignored.
    pub fn register_buffer_shape(&self, buffer: BufferHandle, shape: Shape) {
        self.lock().buffers.entry(buffer).or_insert(shape);
    }

    /// Registers every buffer of the cursor called `name`
    ///
    /// Returns the shape the buffers were registered as, or `None` if `name` has no shape, in
    /// which case nothing is registered. `buffers` is consumed with the lock held and must not
    /// call into the protocol library.
    pub fn register_cursor_buffers<I>(
        &self,
        registry: &ShapeRegistry,
        name: &str,
        buffers: I,
    ) -> Option<Shape>
    where
        I: IntoIterator<Item = BufferHandle>,
    {
        let Some(shape) = registry.lookup(name) else {
            debug!(name, "No cursor shape for cursor name");
            return None;
        };

        let mut maps = self.lock();
        for buffer in buffers {
            trace!(?buffer, name, ?shape, "Registered cursor buffer");
            maps.buffers.entry(buffer).or_insert(shape);
        }
        Some(shape)
    }

    /// The shape registered for `buffer`
    pub fn lookup_buffer_shape(&self, buffer: BufferHandle) -> Option<Shape> {
        self.lock().buffers.get(&buffer).copied()
    }

    /// Registers the shape manager bound on `display`
    ///
    /// Returns whether this call won the registration. A caller that lost still owns `manager`
    /// and has to destroy it.
    pub fn register_shape_manager(&self, display: DisplayHandle, manager: ManagerHandle) -> bool {
        let mut maps = self.lock();
        if maps.managers.contains_key(&display) {
            return false;
        }
        maps.managers.insert(display, manager);
        true
    }

    /// Registers a freshly bound shape manager, destroying it if `display` already has one
    ///
    /// Returns whether `manager` was kept.
    pub fn adopt_shape_manager<F>(&self, display: DisplayHandle, manager: ManagerHandle, factory: &F) -> bool
    where
        F: ShapeDeviceFactory + ?Sized,
    {
        if self.register_shape_manager(display, manager) {
            debug!(?manager, "Registered cursor shape manager");
            return true;
        }
        debug!(?manager, "Display already has a cursor shape manager, destroying");
        factory.destroy_shape_manager(manager);
        false
    }

    /// The shape manager registered for `display`
    pub fn lookup_shape_manager(&self, display: DisplayHandle) -> Option<ManagerHandle> {
        self.lock().managers.get(&display).copied()
    }

    /// Returns the shape device for `object`, creating it on first use
    ///
    /// `None` if no shape manager was bound on `display`, or if the factory could not create a
    /// device. If two threads create a device for the same object at the same time, exactly one
    /// device is kept and the other is destroyed before this returns.
    pub fn get_or_create_shape_device<F>(
        &self,
        object: ObjectHandle,
        display: DisplayHandle,
        kind: DeviceKind,
        factory: &F,
    ) -> Option<ShapeDeviceHandle>
    where
        F: ShapeDeviceFactory + ?Sized,
    {
        let manager = {
            let maps = self.lock();
            if let Some(entry) = maps.devices.get(&object) {
                return Some(entry.device);
            }
            maps.managers.get(&display).copied()
        }?;

        let device = factory.create_shape_device(manager, object, kind)?;

        let winner = {
            let mut maps = self.lock();
            match maps.devices.get(&object) {
                Some(entry) => Some(entry.device),
                None => {
                    maps.devices.insert(object, DeviceEntry { display, device });
                    None
                }
            }
        };

        match winner {
            Some(winner) => {
                debug!(?object, lost = ?device, kept = ?winner, "Lost shape device creation race");
                factory.destroy_shape_device(device);
                Some(winner)
            }
            None => {
                debug!(?object, ?kind, ?device, "Created shape device");
                Some(device)
            }
        }
    }

    /// Drops everything keyed by a proxy that is being destroyed
    ///
    /// Returns the shape device that was created for it, which the caller should destroy.
    pub fn forget_object(&self, object: ObjectHandle) -> Option<ShapeDeviceHandle> {
        let mut maps = self.lock();
        maps.buffers.remove(&BufferHandle::from(object));
        maps.devices.remove(&object).map(|entry| entry.device)
    }

    /// Drops the shape manager and all shape devices of a disconnected display
    pub fn forget_display(&self, display: DisplayHandle) {
        let mut maps = self.lock();
        maps.managers.remove(&display);
        maps.devices.retain(|_, entry| entry.display != display);
    }
}
