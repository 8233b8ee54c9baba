//! Interpreter lock capability
//!
//! Design: every operation that touches interpreter state takes a `Gil<'py>`
//! token. The token is `Copy` but `!Send`, and handles carry its `'py`
//! lifetime, so nothing obtained under the lock can outlive it or move to
//! another thread.

use std::marker::PhantomData;

use once_cell::sync::OnceCell;

use crate::sys;

/// Proof that the calling thread holds the interpreter lock
#[derive(Clone, Copy)]
pub struct Gil<'py>(PhantomData<(&'py (), *mut ())>);

impl<'py> Gil<'py> {
    /// Conjure a token for code the interpreter calls with its lock held
    ///
    /// # Safety
    /// The calling thread must hold the interpreter lock for `'py`.
    #[inline]
    pub unsafe fn assume() -> Self {
        Gil(PhantomData)
    }
}

impl std::fmt::Debug for Gil<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Gil")
    }
}

static BACKEND_READY: OnceCell<()> = OnceCell::new();

/// Initialize the interpreter backend once per process
pub(crate) fn ensure_backend() {
    BACKEND_READY.get_or_init(sys::initialize);
}

struct GilGuard {
    state: Option<sys::GilState>,
}

impl Drop for GilGuard {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            unsafe { sys::gil_release(state) };
        }
    }
}

/// Run `f` with the interpreter lock held
///
/// Reentrant: nested calls on the same thread are fine. The lock is
/// released when `f` returns or unwinds.
pub fn with_gil<F, R>(f: F) -> R
where
    F: for<'py> FnOnce(Gil<'py>) -> R,
{
    ensure_backend();
    let _guard = GilGuard {
        state: Some(unsafe { sys::gil_ensure() }),
    };
    f(unsafe { Gil::assume() })
}

/// Whether the calling thread holds the interpreter lock
pub fn gil_held() -> bool {
    BACKEND_READY.get().is_some() && sys::gil_check()
}
