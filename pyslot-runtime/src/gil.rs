//! Interpreter lock
//!
//! Design: a process-wide reentrant lock. The C ABI acquires and releases
//! in matched pairs from the same thread; a thread-local depth counter lets
//! `pyrt_gil_check` answer without touching the lock.

use core::cell::Cell;
use core::ffi::c_int;

use once_cell::sync::Lazy;
use parking_lot::ReentrantMutex;

use crate::logging::trace;

static GIL: Lazy<ReentrantMutex<()>> = Lazy::new(|| ReentrantMutex::new(()));

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Acquire the interpreter lock for the calling thread
///
/// Reentrant; returns the nesting depth after acquiring.
#[no_mangle]
pub extern "C" fn pyrt_gil_ensure() -> c_int {
    core::mem::forget(GIL.lock());
    let depth = DEPTH.with(|d| {
        d.set(d.get() + 1);
        d.get()
    });
    if depth == 1 {
        trace!(target: "gil", "acquired");
    }
    depth as c_int
}

/// Release one level of the interpreter lock
///
/// Returns the remaining depth, or -1 when the thread does not hold it.
#[no_mangle]
pub extern "C" fn pyrt_gil_release() -> c_int {
    let held = DEPTH.with(|d| d.get());
    if held == 0 {
        return -1;
    }

    DEPTH.with(|d| d.set(held - 1));
    // The guard forgotten in `pyrt_gil_ensure` belongs to this thread
    unsafe { GIL.force_unlock() };
    if held == 1 {
        trace!(target: "gil", "released");
    }
    (held - 1) as c_int
}

/// Whether the calling thread holds the interpreter lock
#[no_mangle]
pub extern "C" fn pyrt_gil_check() -> bool {
    DEPTH.with(|d| d.get() > 0)
}

/// Run `f` with the interpreter lock held
pub fn with_lock<R>(f: impl FnOnce() -> R) -> R {
    struct Release;

    impl Drop for Release {
        fn drop(&mut self) {
            pyrt_gil_release();
        }
    }

    pyrt_gil_ensure();
    let _release = Release;
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reentrant_depth() {
        assert!(!pyrt_gil_check());
        assert_eq!(pyrt_gil_ensure(), 1);
        assert_eq!(pyrt_gil_ensure(), 2);
        assert!(pyrt_gil_check());
        assert_eq!(pyrt_gil_release(), 1);
        assert_eq!(pyrt_gil_release(), 0);
        assert!(!pyrt_gil_check());
    }

    #[test]
    fn test_release_without_hold() {
        std::thread::spawn(|| assert_eq!(pyrt_gil_release(), -1))
            .join()
            .unwrap();
    }

    #[test]
    fn test_with_lock_releases_on_exit() {
        std::thread::spawn(|| {
            with_lock(|| assert!(pyrt_gil_check()));
            assert!(!pyrt_gil_check());
        })
        .join()
        .unwrap();
    }
}
