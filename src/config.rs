//! Environment configuration
//!
//! The shim has no configuration file and no command line. A handful of environment variables
//! are read once, when the process state is built.

use crate::utils::env_flag;

/// `EnvFilter` directives for the shim's own log output
pub const LOG_ENV: &str = "CURSOR_SHAPE_SHIM_LOG";
/// Forward every request untouched
pub const DISABLE_ENV: &str = "CURSOR_SHAPE_SHIM_DISABLE";
/// Skip the GTK 4 cursor theme fallback
pub const NO_TOOLKIT_ENV: &str = "CURSOR_SHAPE_SHIM_NO_TOOLKIT";

/// Log directives used when [`LOG_ENV`] is unset
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Settings read from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directives for the log filter
    pub log_filter: String,
    /// Whether translation is turned off
    pub disabled: bool,
    /// Whether the GTK 4 fallback is turned off
    pub no_toolkit: bool,
}

impl Config {
    /// Reads the configuration from the process environment
    pub fn from_env() -> Config {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Config
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_filter = lookup(LOG_ENV)
            .filter(|filter| !filter.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_owned());
        Config {
            log_filter,
            disabled: env_flag(lookup(DISABLE_ENV).as_deref()),
            no_toolkit: env_flag(lookup(NO_TOOLKIT_ENV).as_deref()),
        }
    }

    /// Whether the GTK 4 fallback may be used
    pub fn toolkit_enabled(&self) -> bool {
        cfg!(feature = "toolkit_fallback") && !self.disabled && !self.no_toolkit
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::from_lookup(|_| None)
    }
}
