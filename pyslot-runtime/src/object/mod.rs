//! Object layout - headers, type objects and instance allocation
//!
//! Design: C-compatible layouts for a reference-counted heap:
//! 1. Every object starts with a `PyObject` header (refcount + type pointer)
//! 2. Types are objects too and carry the slot table used for dispatch
//! 3. Extension instances are zeroed allocations of `tp_basicsize` bytes
//! 4. Static types and singletons are immortal and never freed

mod protocol;
mod refcount;


pub use protocol::{
    ordering_matches, pyrt_object_call, pyrt_object_compare, pyrt_object_init,
    pyrt_object_is_subclass, pyrt_object_is_true, pyrt_object_repr, pyrt_object_richcompare,
    pyrt_object_str, pyrt_type_call, PY_EQ, PY_GE, PY_GT, PY_LE, PY_LT, PY_NE,
};
pub use refcount::{pyrt_decref, pyrt_incref, pyrt_refcnt};

use core::ffi::{c_char, c_int};
use core::ptr::{self, NonNull};
use std::alloc::{self, Layout};
use std::ffi::CStr;
use std::sync::atomic::AtomicIsize;

use once_cell::sync::Lazy;

use crate::logging::{debug, trace};

/// `&'static CStr` from a string literal
macro_rules! cstr {
    ($s:literal) => {
        unsafe { ::std::ffi::CStr::from_bytes_with_nul_unchecked(concat!($s, "\0").as_bytes()) }
    };
}
pub(crate) use cstr;

/// Refcount given to objects that must never be freed
///
/// Far enough from zero that no realistic number of unbalanced decrefs
/// reaches it, far enough from the maximum that increfs cannot overflow.
pub const IMMORTAL_REFCNT: isize = isize::MAX / 2;

/// Type flags
pub const TPFLAGS_IMMORTAL: u32 = 1 << 0;
pub const TPFLAGS_HEAPTYPE: u32 = 1 << 1;
pub const TPFLAGS_EXCEPTION: u32 = 1 << 2;

/// Object header - prefixed to every heap object
#[repr(C)]
pub struct PyObject {
    pub ob_refcnt: AtomicIsize,
    pub ob_type: *mut PyTypeObject,
}

impl PyObject {
    /// Header for a freshly allocated object owned by its creator
    #[inline]
    pub const fn new(ob_type: *mut PyTypeObject) -> Self {
        Self {
            ob_refcnt: AtomicIsize::new(1),
            ob_type,
        }
    }

    /// Header for an object that lives for the whole process
    #[inline]
    pub const fn immortal(ob_type: *mut PyTypeObject) -> Self {
        Self {
            ob_refcnt: AtomicIsize::new(IMMORTAL_REFCNT),
            ob_type,
        }
    }
}

pub type Destructor = unsafe extern "C" fn(*mut PyObject);
pub type FreeFunc = unsafe extern "C" fn(*mut PyObject);
pub type TernaryFunc =
    unsafe extern "C" fn(*mut PyObject, *mut PyObject, *mut PyObject) -> *mut PyObject;
pub type CmpFunc = unsafe extern "C" fn(*mut PyObject, *mut PyObject) -> c_int;
pub type InitProc = unsafe extern "C" fn(*mut PyObject, *mut PyObject, *mut PyObject) -> c_int;
pub type ReprFunc = unsafe extern "C" fn(*mut PyObject) -> *mut PyObject;
pub type RichCmpFunc = unsafe extern "C" fn(*mut PyObject, *mut PyObject, c_int) -> *mut PyObject;

/// Slot table - the virtual-call entry points of a type
#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct TypeSlots {
    pub dealloc: Option<Destructor>,
    pub call: Option<TernaryFunc>,
    pub compare: Option<CmpFunc>,
    pub init: Option<InitProc>,
    pub repr: Option<ReprFunc>,
    pub str: Option<ReprFunc>,
    pub richcompare: Option<RichCmpFunc>,
    pub free: Option<FreeFunc>,
}

/// Type object - immutable per-type information shared by all instances
#[repr(C)]
pub struct PyTypeObject {
    pub ob_base: PyObject,
    pub tp_name: *const c_char,
    pub tp_basicsize: usize,
    pub tp_flags: u32,
    pub tp_base: *mut PyTypeObject,
    pub tp_slots: TypeSlots,
}

/// Pointer to a process-lifetime object, shareable between threads
///
/// Every access to the pointee happens under the interpreter lock.
pub(crate) struct StaticPtr<T>(NonNull<T>);

unsafe impl<T> Send for StaticPtr<T> {}
unsafe impl<T> Sync for StaticPtr<T> {}

impl<T> StaticPtr<T> {
    #[inline]
    pub(crate) fn leak(value: T) -> Self {
        Self(NonNull::from(Box::leak(Box::new(value))))
    }

    #[inline]
    pub(crate) fn as_ptr(&self) -> *mut T {
        self.0.as_ptr()
    }
}

static TYPE_TYPE: Lazy<StaticPtr<PyTypeObject>> = Lazy::new(|| {
    let tp = StaticPtr::leak(PyTypeObject {
        ob_base: PyObject::immortal(ptr::null_mut()),
        tp_name: cstr!("type").as_ptr(),
        tp_basicsize: core::mem::size_of::<PyTypeObject>(),
        tp_flags: TPFLAGS_IMMORTAL,
        tp_base: ptr::null_mut(),
        tp_slots: TypeSlots {
            repr: Some(type_repr),
            ..TypeSlots::default()
        },
    });
    // The metatype is its own type
    unsafe { (*tp.as_ptr()).ob_base.ob_type = tp.as_ptr() };
    tp
});

/// The metatype every type object is an instance of
#[inline]
pub fn type_type() -> *mut PyTypeObject {
    TYPE_TYPE.as_ptr()
}

/// Create an immortal type object that lives for the rest of the process
pub(crate) fn new_static_type(
    name: &'static CStr,
    basicsize: usize,
    flags: u32,
    base: *mut PyTypeObject,
    slots: TypeSlots,
) -> StaticPtr<PyTypeObject> {
    StaticPtr::leak(PyTypeObject {
        ob_base: PyObject::immortal(type_type()),
        tp_name: name.as_ptr(),
        tp_basicsize: basicsize,
        tp_flags: flags | TPFLAGS_IMMORTAL,
        tp_base: base,
        tp_slots: slots,
    })
}

unsafe extern "C" fn type_repr(obj: *mut PyObject) -> *mut PyObject {
    let tp = obj as *mut PyTypeObject;
    crate::builtins::string::new_str(&format!("<class '{}'>", type_name(tp)))
}

/// Register a new extension type
///
/// Types created here are never freed: instances may outlive any handle the
/// host keeps on the type. Returns null with `SystemError` set when
/// `basicsize` cannot hold an object header.
///
/// # Safety
/// - `name` must be a valid NUL-terminated string
/// - `slots` must point to a valid slot table (copied, not retained)
#[no_mangle]
pub unsafe extern "C" fn pyrt_type_new(
    name: *const c_char,
    basicsize: usize,
    slots: *const TypeSlots,
) -> *mut PyTypeObject {
    if name.is_null() || slots.is_null() {
        crate::errors::set_error(crate::exceptions::system_error(), "bad argument to pyrt_type_new");
        return ptr::null_mut();
    }
    if basicsize < core::mem::size_of::<PyObject>() {
        crate::errors::set_error(
            crate::exceptions::system_error(),
            &format!("basicsize {} smaller than object header", basicsize),
        );
        return ptr::null_mut();
    }

    let name: &'static CStr = Box::leak(CStr::from_ptr(name).to_owned().into_boxed_c_str());
    let tp = new_static_type(name, basicsize, TPFLAGS_HEAPTYPE, ptr::null_mut(), *slots);

    debug!(type_name = type_name(tp.as_ptr()), basicsize, "type registered");
    tp.as_ptr()
}

/// Alignment of every instance allocation; covers `u128` and SIMD payloads
pub const INSTANCE_ALIGN: usize = 16;

#[inline]
fn instance_layout(size: usize) -> Option<Layout> {
    let size = size.max(core::mem::size_of::<PyObject>());
    let align = INSTANCE_ALIGN.max(core::mem::align_of::<PyObject>());
    Layout::from_size_align(size, align).ok()
}

/// Allocate a zeroed instance of `tp` with refcount 1
///
/// # Safety
/// - `tp` must be a valid type object (or null, which returns null)
#[no_mangle]
pub unsafe extern "C" fn pyrt_type_generic_alloc(tp: *mut PyTypeObject) -> *mut PyObject {
    if tp.is_null() {
        return ptr::null_mut();
    }

    let Some(layout) = instance_layout((*tp).tp_basicsize) else {
        crate::errors::set_error(crate::exceptions::system_error(), "invalid instance layout");
        return ptr::null_mut();
    };

    let raw = alloc::alloc_zeroed(layout) as *mut PyObject;
    if raw.is_null() {
        crate::errors::set_error(crate::exceptions::system_error(), "out of memory");
        return ptr::null_mut();
    }

    raw.write(PyObject::new(tp));
    trace!(event = "object_alloc", type_name = type_name(tp), address = ?raw);
    raw
}

/// Release instance memory obtained from `pyrt_type_generic_alloc`
///
/// # Safety
/// - `obj` must come from `pyrt_type_generic_alloc` and not be used afterwards
#[no_mangle]
pub unsafe extern "C" fn pyrt_object_free(obj: *mut PyObject) {
    if obj.is_null() {
        return;
    }

    let tp = (*obj).ob_type;
    if let Some(layout) = instance_layout((*tp).tp_basicsize) {
        alloc::dealloc(obj as *mut u8, layout);
    }
}

/// Generic free - the type's free slot, or the default instance free
///
/// # Safety
/// - `obj` must be a valid object that nobody references any more
#[no_mangle]
pub unsafe extern "C" fn pyrt_object_del(obj: *mut PyObject) {
    if obj.is_null() {
        return;
    }

    let tp = (*obj).ob_type;
    crate::logging::log_destroy(type_name(tp), obj as *const u8);
    match (*tp).tp_slots.free {
        Some(free) => free(obj),
        None => pyrt_object_free(obj),
    }
}

/// Type pointer of an object
///
/// # Safety
/// - `obj` must be a valid object
#[no_mangle]
pub unsafe extern "C" fn pyrt_type_of(obj: *mut PyObject) -> *mut PyTypeObject {
    (*obj).ob_type
}

/// Name of a type
///
/// # Safety
/// - `tp` must be a valid type object
#[inline]
pub unsafe fn type_name(tp: *mut PyTypeObject) -> &'static str {
    CStr::from_ptr((*tp).tp_name).to_str().unwrap_or("<unnamed>")
}

/// Whether `derived` is `base` or inherits from it
///
/// # Safety
/// - both must be valid type objects
#[no_mangle]
pub unsafe extern "C" fn pyrt_type_is_subtype(
    derived: *mut PyTypeObject,
    base: *mut PyTypeObject,
) -> bool {
    let mut current = derived;
    while !current.is_null() {
        if current == base {
            return true;
        }
        current = (*current).tp_base;
    }
    false
}

/// Whether `obj` is itself a type object
///
/// # Safety
/// - `obj` must be a valid object
#[inline]
pub unsafe fn is_type(obj: *mut PyObject) -> bool {
    (*obj).ob_type == type_type()
}
