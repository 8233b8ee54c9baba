//! Reference counting - C API for refcount operations
//!
//! Hot path operations with minimal overhead, inlined by compiler.
//! Atomic counters so immortal statics can be touched from any thread.

use super::{pyrt_object_del, PyObject};
use std::sync::atomic::Ordering;

/// Increment reference count
///
/// # Safety
/// - Null-safe (no-op for null pointers)
/// - Object must be a live heap object
#[no_mangle]
pub unsafe extern "C" fn pyrt_incref(obj: *mut PyObject) {
    if obj.is_null() {
        return;
    }

    let old = (*obj).ob_refcnt.fetch_add(1, Ordering::Relaxed);
    debug_assert!(old > 0, "incref of dead object");
}

/// Decrement reference count, destroy if it reaches zero
///
/// # Safety
/// - Null-safe (no-op for null pointers)
/// - Object must be a live heap object
/// - Runs the type's dealloc slot when the count hits zero
#[no_mangle]
pub unsafe extern "C" fn pyrt_decref(obj: *mut PyObject) {
    if obj.is_null() {
        return;
    }

    let old = (*obj).ob_refcnt.fetch_sub(1, Ordering::Release);
    debug_assert!(old > 0, "refcount underflow");

    if old == 1 {
        // Synchronize with all previous decrements
        std::sync::atomic::fence(Ordering::Acquire);
        destroy_object(obj);
    }
}

/// Get current reference count (for debugging/testing)
///
/// # Safety
/// - Returns 0 for null pointers
/// - Object must be a live heap object
#[no_mangle]
pub unsafe extern "C" fn pyrt_refcnt(obj: *mut PyObject) -> isize {
    if obj.is_null() {
        return 0;
    }

    (*obj).ob_refcnt.load(Ordering::Relaxed)
}

/// Destroy object (cold path, separated for better code generation)
#[cold]
#[inline(never)]
unsafe fn destroy_object(obj: *mut PyObject) {
    let tp = (*obj).ob_type;

    match (*tp).tp_slots.dealloc {
        Some(dealloc) => dealloc(obj),
        None => pyrt_object_del(obj),
    }
}
