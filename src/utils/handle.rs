macro_rules! opaque_handle {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        ///
        /// The handle only carries the address of an object owned by someone else. It is
        /// compared and hashed by identity and never dereferenced through this type.
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(usize);

        impl $name {
            /// Wraps a foreign pointer, `None` if it is null
            pub fn from_ptr<T>(ptr: *const T) -> Option<Self> {
                if ptr.is_null() {
                    None
                } else {
                    Some(Self(ptr as usize))
                }
            }

            /// Builds a handle from a raw address, for tests and other non-pointer sources
            pub const fn from_raw(addr: usize) -> Self {
                Self(addr)
            }

            /// The wrapped address as a pointer of the caller's choosing
            pub fn as_ptr<T>(self) -> *mut T {
                self.0 as *mut T
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({:#x})", stringify!($name), self.0)
            }
        }
    };
}

opaque_handle!(
    /// Handle to a `wl_buffer`
    BufferHandle
);
opaque_handle!(
    /// Handle to a `wl_display` connection
    DisplayHandle
);
opaque_handle!(
    /// Handle to any client-side proxy, such as a `wl_pointer`, a `zwp_tablet_tool_v2` or a
    /// `wl_surface`
    ObjectHandle
);
opaque_handle!(
    /// Handle to a bound `wp_cursor_shape_manager_v1`
    ManagerHandle
);
opaque_handle!(
    /// Handle to a `wp_cursor_shape_device_v1`
    ShapeDeviceHandle
);

impl From<ObjectHandle> for BufferHandle {
    fn from(object: ObjectHandle) -> Self {
        BufferHandle(object.0)
    }
}
