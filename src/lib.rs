#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! # cursor-shape-shim: server-side cursors for legacy Wayland clients
//!
//! This crate builds a library meant to be loaded with `LD_PRELOAD` into Wayland client
//! applications that still draw their own cursor images. Whenever such an application sets a
//! cursor surface whose buffer came from a named cursor of its theme, the shim replaces the
//! bitmap with a `wp_cursor_shape_device_v1.set_shape` request, so the compositor draws the
//! cursor itself, in the user's theme and at the right scale.
//!
//! ```sh
//! LD_PRELOAD=/path/to/libcursor_shape_shim.so some-application
//! ```
//!
//! Nothing changes for compositors that do not advertise `wp_cursor_shape_manager_v1`, or for
//! cursors the shim cannot name. Those keep going through the legacy path, request for request.
//!
//! ## Structure of the crate
//!
//! - [`shape`] knows the cursor shapes and which cursor names map to them.
//! - [`cache`] remembers buffers, shape managers and shape devices by object identity.
//! - [`translate`] is the per-thread state machine that decides between rewriting a cursor
//!   update and replaying it.
//! - [`toolkit`] recovers cursor names from GTK 4, which loads cursors on its own.
//! - [`ffi`] contains the exported hooks and everything that touches libwayland directly,
//!   [`interpose`] finds the functions the hooks shadow.
//! - [`state`] and [`config`] hold what the hooks share.
//!
//! ## Configuration
//!
//! The shim reads a few environment variables, see [`config`]:
//!
//! - `CURSOR_SHAPE_SHIM_DISABLE=1` passes everything through untouched,
//! - `CURSOR_SHAPE_SHIM_NO_TOOLKIT=1` turns off the GTK 4 fallback.
//!
//! The GTK hooks themselves are only compiled with the `toolkit_fallback` feature, which is on
//! by default.
//!
//! ### Logging
//!
//! The shim makes extensive use of [`tracing`] for its internal logging.
//!
//! The library carries its own copy of `tracing`, so a subscriber set by the host application
//! never sees these events. The shim installs a compact one writing to stderr, filtered by the
//! `CURSOR_SHAPE_SHIM_LOG` variable (`warn` if unset), for example:
//!
//! ```sh
//! CURSOR_SHAPE_SHIM_LOG=cursor_shape_shim=debug LD_PRELOAD=... some-application
//! ```

pub mod cache;
pub mod config;
pub mod ffi;
pub mod interpose;
pub mod logging;
pub mod shape;
pub mod state;
pub mod toolkit;
pub mod translate;
pub mod utils;
