//! Process-wide shim state
//!
//! Everything the hooks share lives in one [`ShimState`], built by whichever hook runs first.
//! Building it reads the [`Config`] and installs the log subscriber.

use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::cache::IdentityCaches;
use crate::config::Config;
use crate::logging::init_logging;
use crate::shape::Shape;
use crate::toolkit::ToolkitFallback;
use crate::utils::BufferHandle;

static STATE: OnceCell<ShimState> = OnceCell::new();

/// Shared state of all hooks
#[derive(Debug)]
pub struct ShimState {
    /// Settings read at startup
    pub config: Config,
    /// Buffer, manager and device caches
    pub caches: IdentityCaches,
    /// The GTK 4 fallback
    pub toolkit: ToolkitFallback,
}

impl ShimState {
    /// Creates the state for `config`
    pub fn new(config: Config) -> ShimState {
        ShimState {
            config,
            caches: IdentityCaches::new(),
            toolkit: ToolkitFallback::new(),
        }
    }

    /// Resolves a buffer through the toolkit fallback
    pub fn toolkit_buffer_shape(&self, buffer: BufferHandle) -> Option<Shape> {
        if !self.config.toolkit_enabled() {
            return None;
        }
        self.toolkit.buffer_shape(&self.caches, buffer)
    }

    /// Runs toolkit discovery if enabled, and arms the display capture
    ///
    /// Returns whether the latch was armed.
    pub fn arm_toolkit_capture(&self) -> bool {
        if !self.config.toolkit_enabled() {
            return false;
        }
        self.toolkit.discover();
        self.toolkit.arm()
    }
}

/// The process state, built on first use
pub fn state() -> &'static ShimState {
    STATE.get_or_init(|| {
        let config = Config::from_env();
        let installed = init_logging(&config.log_filter);
        debug!(?config, subscriber = installed, "cursor-shape-shim initialized");
        if config.disabled {
            info!("Cursor shape translation disabled");
        }
        ShimState::new(config)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_toolkit_is_never_consulted() {
        let state = ShimState::new(Config {
            no_toolkit: true,
            ..Config::default()
        });
        assert!(!state.arm_toolkit_capture());
        assert!(!state.toolkit.is_available());
        assert_eq!(state.toolkit_buffer_shape(BufferHandle::from_raw(0x10)), None);
    }

    #[test]
    fn state_is_shared() {
        assert!(std::ptr::eq(state(), state()));
    }

    // Hooks build the state first, so the log subscriber exists before a failed lookup aborts.
    #[test]
    fn state_is_built_without_forwarding_targets() {
        use crate::ffi::sys::{NEXT_DISPLAY_DISCONNECT, NEXT_PROXY_DESTROY};

        state();
        assert!(!NEXT_DISPLAY_DISCONNECT.is_resolved());
        assert!(!NEXT_PROXY_DESTROY.is_resolved());
    }
}
