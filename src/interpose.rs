//! Forwarding to the interposed definitions
//!
//! Every entry point the shim exports shadows a function of the same name in a library loaded
//! after it. A [`NextSymbol`] names that function and finds the next definition through
//! `dlsym(RTLD_NEXT, ...)` the first time it is needed. The address is kept for the lifetime of
//! the process, racing resolutions all store the same value.

use std::ffi::{c_void, CStr};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicPtr, Ordering};

use tracing::{error, trace};

/// Error resolving the next definition of a symbol
#[derive(thiserror::Error, Debug)]
pub enum InterposeError {
    /// No library loaded after this one defines the symbol
    #[error("no next definition of `{0}`")]
    Unresolved(&'static str),
}

/// The next definition of an interposed function
///
/// `F` is the function pointer type of the symbol, for example
/// `unsafe extern "C" fn(*mut c_void) -> c_int`.
pub struct NextSymbol<F> {
    name: &'static CStr,
    addr: AtomicPtr<c_void>,
    _fn: PhantomData<F>,
}

impl<F: Copy> NextSymbol<F> {
    /// Declares the next definition of `name`
    ///
    /// # Safety
    ///
    /// `F` must be a function pointer type matching the C signature of `name`.
    pub const unsafe fn new(name: &'static CStr) -> Self {
        assert!(std::mem::size_of::<F>() == std::mem::size_of::<*mut c_void>());
        NextSymbol {
            name,
            addr: AtomicPtr::new(std::ptr::null_mut()),
            _fn: PhantomData,
        }
    }

    /// The symbol name
    pub fn name(&self) -> &'static str {
        self.name.to_str().unwrap_or("<invalid>")
    }

    /// Resolves the next definition, or returns the cached one
    pub fn resolve(&self) -> Result<F, InterposeError> {
        let mut addr = self.addr.load(Ordering::Acquire);
        if addr.is_null() {
            addr = unsafe { libc::dlsym(libc::RTLD_NEXT, self.name.as_ptr()) };
            if addr.is_null() {
                return Err(InterposeError::Unresolved(self.name()));
            }
            trace!(symbol = self.name(), ?addr, "Resolved next definition");
            self.addr.store(addr, Ordering::Release);
        }
        // SAFETY: `F` is a function pointer of the same size as `addr`, as checked in `new`
        Ok(unsafe { std::mem::transmute_copy::<*mut c_void, F>(&addr) })
    }

    #[cfg(test)]
    pub(crate) fn is_resolved(&self) -> bool {
        !self.addr.load(Ordering::Acquire).is_null()
    }

    /// Like [`resolve`](Self::resolve), but aborts the process on failure
    ///
    /// Used for the functions the shim shadows: a call that cannot be forwarded has no correct
    /// outcome.
    pub fn get(&self) -> F {
        match self.resolve() {
            Ok(f) => f,
            Err(err) => {
                error!(symbol = self.name(), "{}", err);
                std::process::abort();
            }
        }
    }
}

impl<F> std::fmt::Debug for NextSymbol<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NextSymbol")
            .field("name", &self.name)
            .field("addr", &self.addr.load(Ordering::Relaxed))
            .finish()
    }
}

// SAFETY: only an address is stored, `F` is never instantiated
unsafe impl<F> Sync for NextSymbol<F> {}
unsafe impl<F> Send for NextSymbol<F> {}
