//! Shape lookup through GTK 4's own cursor theme
//!
//! GTK 4 loads its cursors through a vendored cursor library, so the buffer cache never learns
//! about them. What GTK does keep is a cursor theme per display, reachable through the private
//! function `_gdk_wayland_display_get_cursor_theme`. This module:
//!
//! - finds that function in the symbol table of the loaded `libgtk-4.so` ([`elf`]),
//! - captures the `GdkWaylandDisplay` when GTK registers its `wl_registry` listener,
//! - walks the theme to recover the cursor name of an unknown buffer ([`theme`]).
//!
//! All of this is best-effort. Any failure leaves the fallback disabled and the legacy cursor
//! path in charge.

use std::ffi::{c_void, CStr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::cache::IdentityCaches;
use crate::shape::{Shape, SHAPE_REGISTRY};
use crate::utils::BufferHandle;

pub mod elf;
pub mod theme;

use self::elf::{ElfError, ElfFile};
use self::theme::{cursor_name_for_buffer, ToolkitCursorTheme};

/// The private GTK function returning a display's cursor theme
pub const CURSOR_THEME_ACCESSOR: &str = "_gdk_wayland_display_get_cursor_theme";

const TOOLKIT_PROBE: &CStr = c"gtk_init";
const GTK4_MODULE: &str = "libgtk-4.so";

type CursorThemeAccessor = unsafe extern "C" fn(*mut c_void) -> *mut ToolkitCursorTheme;

/// Errors finding the cursor theme accessor
#[derive(thiserror::Error, Debug)]
pub enum DiscoveryError {
    /// No library loaded after the shim defines `gtk_init`
    #[error("No toolkit is loaded")]
    NotLoaded,
    /// `dladdr` could not attribute `gtk_init` to a module
    #[error("Failed to locate the module defining gtk_init")]
    UnknownModule,
    /// The toolkit is some other GTK version
    #[error("Loaded toolkit {0:?} is not GTK 4")]
    NotGtk4(PathBuf),
    /// The module file could not be parsed
    #[error("Failed to read toolkit module: {0}")]
    Elf(#[from] ElfError),
    /// The module has no symbol table entry for the accessor
    #[error("Toolkit module has no `{0}`")]
    AccessorMissing(&'static str),
}

/// Process-wide state of the GTK 4 fallback
#[derive(Debug)]
pub struct ToolkitFallback {
    claimed: AtomicBool,
    accessor: OnceCell<CursorThemeAccessor>,
    capturing: AtomicBool,
    display: AtomicPtr<c_void>,
}

impl ToolkitFallback {
    /// Creates a fallback that has not looked for GTK yet
    pub const fn new() -> Self {
        ToolkitFallback {
            claimed: AtomicBool::new(false),
            accessor: OnceCell::new(),
            capturing: AtomicBool::new(false),
            display: AtomicPtr::new(std::ptr::null_mut()),
        }
    }

    /// Looks for the cursor theme accessor, once per process
    ///
    /// Only the first caller does the work. Callers racing with it return immediately and see
    /// the fallback as unavailable until discovery completed.
    pub fn discover(&self) {
        if self.claimed.swap(true, Ordering::AcqRel) {
            return;
        }
        match find_accessor() {
            Ok(accessor) => {
                let _ = self.accessor.set(accessor);
            }
            Err(err) => debug!("GTK 4 cursor theme fallback disabled: {}", err),
        }
    }

    /// Whether the accessor was found
    pub fn is_available(&self) -> bool {
        self.accessor.get().is_some()
    }

    /// Arms the display capture latch
    ///
    /// Does nothing and returns `false` if the fallback is unavailable or a display was already
    /// captured.
    pub fn arm(&self) -> bool {
        if !self.is_available() || !self.display.load(Ordering::Acquire).is_null() {
            return false;
        }
        self.capturing.store(true, Ordering::Release);
        true
    }

    /// Disarms the display capture latch
    pub fn disarm(&self) {
        self.capturing.store(false, Ordering::Release);
    }

    /// Offers the user data of a `wl_registry` listener as the toolkit display
    ///
    /// Taken only while the latch is armed, which it disarms.
    pub fn capture_display(&self, data: *mut c_void) -> bool {
        if data.is_null() || !self.capturing.swap(false, Ordering::AcqRel) {
            return false;
        }
        match self
            .display
            .compare_exchange(std::ptr::null_mut(), data, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                info!(display = ?data, "Captured GdkWaylandDisplay");
                true
            }
            Err(_) => false,
        }
    }

    /// Whether a toolkit display was captured
    #[cfg(test)]
    pub(crate) fn has_display(&self) -> bool {
        !self.display.load(Ordering::Acquire).is_null()
    }

    /// Resolves `buffer` through the toolkit's cursor theme
    ///
    /// A shape found this way is registered in `caches`, so the theme is walked at most once per
    /// buffer that resolves.
    pub fn buffer_shape(&self, caches: &IdentityCaches, buffer: BufferHandle) -> Option<Shape> {
        let display = self.display.load(Ordering::Acquire);
        if display.is_null() {
            return None;
        }
        let accessor = self.accessor.get()?;

        // SAFETY: the accessor was found in the loaded GTK 4 module and `display` is the
        // GdkWaylandDisplay GTK registered its registry listener with
        let theme = unsafe { accessor(display) };
        // SAFETY: the theme is owned by GTK and stays alive for the display's lifetime
        let name = unsafe { cursor_name_for_buffer(theme, buffer) }?;
        let Some(shape) = name.to_str().ok().and_then(|name| SHAPE_REGISTRY.lookup(name)) else {
            debug!(?buffer, ?name, "No shape for GTK cursor");
            return None;
        };

        caches.register_buffer_shape(buffer, shape);
        debug!(?buffer, ?name, ?shape, "Registered GTK cursor buffer");
        Some(shape)
    }

    #[cfg(test)]
    pub(crate) fn with_accessor(accessor: CursorThemeAccessor) -> Self {
        let fallback = ToolkitFallback::new();
        fallback.claimed.store(true, Ordering::Release);
        let _ = fallback.accessor.set(accessor);
        fallback
    }
}

impl Default for ToolkitFallback {
    fn default() -> Self {
        Self::new()
    }
}

fn find_accessor() -> Result<CursorThemeAccessor, DiscoveryError> {
    // SAFETY: the probe name is a valid C string
    let probe = unsafe { libc::dlsym(libc::RTLD_NEXT, TOOLKIT_PROBE.as_ptr()) };
    if probe.is_null() {
        return Err(DiscoveryError::NotLoaded);
    }

    let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
    // SAFETY: `info` is a valid out parameter
    if unsafe { libc::dladdr(probe, &mut info) } == 0 || info.dli_fname.is_null() {
        return Err(DiscoveryError::UnknownModule);
    }
    // SAFETY: dladdr returns a NUL terminated path that lives as long as the module
    let path = PathBuf::from(
        unsafe { CStr::from_ptr(info.dli_fname) }
            .to_string_lossy()
            .into_owned(),
    );
    let is_gtk4 = path
        .file_name()
        .map(|name| name.to_string_lossy().contains(GTK4_MODULE))
        .unwrap_or(false);
    if !is_gtk4 {
        return Err(DiscoveryError::NotGtk4(path));
    }

    let value = ElfFile::open(&path)?
        .symbol_value(CURSOR_THEME_ACCESSOR)?
        .filter(|&value| value != 0)
        .ok_or(DiscoveryError::AccessorMissing(CURSOR_THEME_ACCESSOR))?;
    let addr = (info.dli_fbase as usize).wrapping_add(value as usize);
    info!(
        module = %path.display(),
        addr = ?(addr as *const c_void),
        "Resolved GTK 4 cursor theme accessor"
    );

    // SAFETY: `addr` is the runtime address of the accessor inside the loaded module
    Ok(unsafe { std::mem::transmute::<usize, CursorThemeAccessor>(addr) })
}
