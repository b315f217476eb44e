//! Read-only mirror of GTK 4's private cursor theme
//!
//! GTK 4 vendors its own copy of libwayland-cursor, loads cursors on demand and keeps one theme
//! for every size, so its buffers never pass through `wl_cursor_theme_get_cursor`. The layouts
//! below match the vendored structures and are only ever read.

use std::ffi::{c_char, c_uint, c_void, CStr};

use crate::utils::BufferHandle;

/// Image metadata, laid out like libwayland-cursor's `wl_cursor_image`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CursorImageHeader {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Hotspot x
    pub hotspot_x: u32,
    /// Hotspot y
    pub hotspot_y: u32,
    /// Animation delay in milliseconds
    pub delay: u32,
}

/// The vendored `wl_cursor_theme`
#[repr(C)]
#[derive(Debug)]
pub struct ToolkitCursorTheme {
    /// Number of loaded cursors
    pub cursor_count: c_uint,
    /// The loaded cursors
    pub cursors: *mut *mut ToolkitCursor,
}

/// The vendored `wl_cursor`
#[repr(C)]
#[derive(Debug)]
pub struct ToolkitCursor {
    /// Number of animation frames
    pub image_count: c_uint,
    /// The animation frames
    pub images: *mut *mut ToolkitCursorImage,
    /// Name the cursor was loaded under
    pub name: *mut c_char,
}

/// The vendored `cursor_image`
#[repr(C)]
#[derive(Debug)]
pub struct ToolkitCursorImage {
    /// Public image metadata
    pub image: CursorImageHeader,
    /// Owning theme
    pub theme: *mut ToolkitCursorTheme,
    /// The `wl_buffer` holding the pixels, if created yet
    pub buffer: *mut c_void,
}

/// Finds the name of the cursor one of whose images uses `buffer`
///
/// Null pointers anywhere in the theme are skipped.
///
/// # Safety
///
/// `theme` must be null or point to a live theme with the layout above, whose arrays hold at
/// least as many entries as their counts claim.
pub unsafe fn cursor_name_for_buffer<'a>(
    theme: *const ToolkitCursorTheme,
    buffer: BufferHandle,
) -> Option<&'a CStr> {
    let theme = theme.as_ref()?;
    if theme.cursors.is_null() {
        return None;
    }
    for i in 0..theme.cursor_count as usize {
        let Some(cursor) = (*theme.cursors.add(i)).as_ref() else {
            continue;
        };
        if cursor.images.is_null() || cursor.name.is_null() {
            continue;
        }
        for j in 0..cursor.image_count as usize {
            let Some(image) = (*cursor.images.add(j)).as_ref() else {
                continue;
            };
            if BufferHandle::from_ptr(image.buffer) == Some(buffer) {
                return Some(CStr::from_ptr(cursor.name));
            }
        }
    }
    None
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::ffi::CString;
    use std::ptr;

    type OwnedCursor = (
        Box<ToolkitCursor>,
        Vec<*mut ToolkitCursorImage>,
        Vec<Box<ToolkitCursorImage>>,
        CString,
    );

    /// An owned theme with the toolkit layout, for tests
    pub(crate) struct FakeTheme {
        pub theme: Box<ToolkitCursorTheme>,
        _cursors: Vec<*mut ToolkitCursor>,
        _owned: Vec<OwnedCursor>,
    }

    impl FakeTheme {
        /// Builds a theme from cursor names and the buffer addresses of their images
        pub(crate) fn new(cursors: &[(&str, &[usize])]) -> FakeTheme {
            let mut owned = Vec::new();
            let mut cursor_ptrs = Vec::new();
            for (name, buffers) in cursors {
                let name = CString::new(*name).unwrap();
                let mut images: Vec<Box<ToolkitCursorImage>> = buffers
                    .iter()
                    .map(|&buffer| {
                        Box::new(ToolkitCursorImage {
                            image: CursorImageHeader {
                                width: 24,
                                height: 24,
                                hotspot_x: 0,
                                hotspot_y: 0,
                                delay: 0,
                            },
                            theme: ptr::null_mut(),
                            buffer: buffer as *mut c_void,
                        })
                    })
                    .collect();
                let mut image_ptrs: Vec<*mut ToolkitCursorImage> =
                    images.iter_mut().map(|image| &mut **image as *mut _).collect();
                let mut cursor = Box::new(ToolkitCursor {
                    image_count: image_ptrs.len() as c_uint,
                    images: image_ptrs.as_mut_ptr(),
                    name: name.as_ptr() as *mut c_char,
                });
                cursor_ptrs.push(&mut *cursor as *mut ToolkitCursor);
                owned.push((cursor, image_ptrs, images, name));
            }
            let theme = Box::new(ToolkitCursorTheme {
                cursor_count: cursor_ptrs.len() as c_uint,
                cursors: cursor_ptrs.as_mut_ptr(),
            });
            FakeTheme {
                theme,
                _cursors: cursor_ptrs,
                _owned: owned,
            }
        }

        pub(crate) fn as_ptr(&self) -> *mut ToolkitCursorTheme {
            &*self.theme as *const ToolkitCursorTheme as *mut _
        }
    }

    #[test]
    fn finds_owning_cursor() {
        let theme = FakeTheme::new(&[
            ("default", &[0x10][..]),
            ("pointer", &[0x20, 0x21][..]),
            ("wait", &[][..]),
        ]);
        let name = unsafe { cursor_name_for_buffer(theme.as_ptr(), BufferHandle::from_raw(0x21)) };
        assert_eq!(name, Some(c"pointer"));
        let name = unsafe { cursor_name_for_buffer(theme.as_ptr(), BufferHandle::from_raw(0x10)) };
        assert_eq!(name, Some(c"default"));
    }

    #[test]
    fn unknown_buffer_or_empty_theme() {
        let theme = FakeTheme::new(&[("default", &[0x10][..])]);
        let name = unsafe { cursor_name_for_buffer(theme.as_ptr(), BufferHandle::from_raw(0x99)) };
        assert_eq!(name, None);

        let name = unsafe { cursor_name_for_buffer(ptr::null(), BufferHandle::from_raw(0x10)) };
        assert_eq!(name, None);
    }

    #[test]
    fn images_without_buffers_are_skipped() {
        // not yet realized images have a null buffer, which must never match
        let theme = FakeTheme::new(&[("text", &[0][..]), ("pointer", &[0x30][..])]);
        let name = unsafe { cursor_name_for_buffer(theme.as_ptr(), BufferHandle::from_raw(0x30)) };
        assert_eq!(name, Some(c"pointer"));
    }
}
