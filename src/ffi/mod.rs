//! The C side of the shim
//!
//! [`hooks`] exports the entry points that shadow libwayland-client, libwayland-cursor and GTK.
//! [`backend`] implements the [`Backend`](crate::translate::Backend) seam on top of the next
//! libwayland-client, with the protocol descriptions from [`protocol`] and the raw layouts
//! from [`sys`].

pub mod backend;
pub mod hooks;
pub mod protocol;
pub mod sys;
