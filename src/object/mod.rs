//! Object handles - ownership of interpreter references made explicit
//!
//! Design: three handle kinds, all tied to the lock lifetime `'py`:
//! 1. `Owned` holds exactly one reference and releases it on drop
//! 2. `Borrowed` is a view that never touches the refcount
//! 3. `Dying` is handed to dealloc closures and frees the instance once
//!
//! `Tuple` and `Dict` are typed borrowed views over argument containers.

mod compare;
mod views;

pub use compare::CompareOp;
pub use views::{Dict, DictIter, Tuple, TupleIter};

use core::ptr::NonNull;
use std::cmp::Ordering;
use std::ffi::{CStr, CString};
use std::fmt;
use std::marker::PhantomData;

use crate::err::{capture, obj_to_obj_err, Error, PyResult};
use crate::gil::Gil;
use crate::sys::{self, PyObject};

/// An owned reference to an interpreter object
pub struct Owned<'py> {
    ptr: NonNull<PyObject>,
    _gil: PhantomData<Gil<'py>>,
}

/// A borrowed view of an interpreter object
#[derive(Clone, Copy)]
pub struct Borrowed<'a, 'py> {
    ptr: NonNull<PyObject>,
    _marker: PhantomData<(&'a (), Gil<'py>)>,
}

/// Text cut at the first NUL, the way C strings see it
pub(crate) fn to_cstring(text: &str) -> CString {
    let head = text.split('\0').next().unwrap_or_default();
    CString::new(head).unwrap_or_default()
}

impl<'py> Owned<'py> {
    /// Take ownership of a new reference; `None` for null
    ///
    /// # Safety
    /// - `ptr` must be null or an owned reference to a live object
    #[inline]
    pub unsafe fn from_owned_ptr(_gil: Gil<'py>, ptr: *mut PyObject) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Owned { ptr, _gil: PhantomData })
    }

    /// Take a new reference to a borrowed object; `None` for null
    ///
    /// # Safety
    /// - `ptr` must be null or point to a live object
    #[inline]
    pub unsafe fn from_borrowed_ptr(gil: Gil<'py>, ptr: *mut PyObject) -> Option<Self> {
        sys::incref(ptr);
        Self::from_owned_ptr(gil, ptr)
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut PyObject {
        self.ptr.as_ptr()
    }

    /// Give up ownership without releasing the reference
    #[inline]
    pub fn into_ptr(self) -> *mut PyObject {
        let ptr = self.ptr.as_ptr();
        std::mem::forget(self);
        ptr
    }

    #[inline]
    pub fn as_borrowed<'a>(&'a self) -> Borrowed<'a, 'py> {
        Borrowed {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }

    /// Wrap a result the interpreter guarantees to be non-null
    unsafe fn from_owned_nonnull(_gil: Gil<'py>, ptr: *mut PyObject) -> Self {
        debug_assert!(!ptr.is_null());
        Owned {
            ptr: NonNull::new_unchecked(ptr),
            _gil: PhantomData,
        }
    }

    pub fn none(gil: Gil<'py>) -> Self {
        unsafe {
            let none = sys::none();
            sys::incref(none);
            Self::from_owned_nonnull(gil, none)
        }
    }

    pub fn not_implemented(gil: Gil<'py>) -> Self {
        unsafe {
            let not_implemented = sys::not_implemented();
            sys::incref(not_implemented);
            Self::from_owned_nonnull(gil, not_implemented)
        }
    }

    pub fn from_bool(gil: Gil<'py>, value: bool) -> Self {
        // Both booleans are singletons; the call only bumps a refcount
        unsafe { Self::from_owned_nonnull(gil, sys::bool_from(value)) }
    }

    pub fn from_i64(gil: Gil<'py>, value: i64) -> PyResult<'py, Self> {
        unsafe { obj_to_obj_err(gil, sys::long_from_i64(value)) }
    }

    /// A new string object; text after an interior NUL is dropped
    pub fn from_str(gil: Gil<'py>, text: &str) -> PyResult<'py, Self> {
        let text = to_cstring(text);
        unsafe { obj_to_obj_err(gil, sys::unicode_from_string(text.as_ptr())) }
    }

    /// A new tuple holding `items`
    pub fn tuple<I>(gil: Gil<'py>, items: I) -> PyResult<'py, Self>
    where
        I: IntoIterator<Item = Owned<'py>>,
        I::IntoIter: ExactSizeIterator,
    {
        let items = items.into_iter();
        let tuple = unsafe { obj_to_obj_err(gil, sys::tuple_new(items.len() as isize))? };
        for (index, item) in items.enumerate() {
            let rc = unsafe { sys::tuple_set_item(tuple.as_ptr(), index as isize, item.into_ptr()) };
            crate::err::int_to_err(gil, rc)?;
        }
        Ok(tuple)
    }

    /// A new dict from string keys; values are not consumed
    pub fn dict<'k, I>(gil: Gil<'py>, entries: I) -> PyResult<'py, Self>
    where
        I: IntoIterator<Item = (&'k str, Borrowed<'k, 'py>)>,
    {
        let dict = unsafe { obj_to_obj_err(gil, sys::dict_new())? };
        for (key, value) in entries {
            let key = to_cstring(key);
            let rc = unsafe { sys::dict_set_item_string(dict.as_ptr(), key.as_ptr(), value.as_ptr()) };
            crate::err::int_to_err(gil, rc)?;
        }
        Ok(dict)
    }

    pub fn gil(&self) -> Gil<'py> {
        unsafe { Gil::assume() }
    }

    // Forwarders to the borrowed view

    pub fn str(&self) -> PyResult<'py, String> {
        self.as_borrowed().str()
    }

    pub fn repr(&self) -> PyResult<'py, String> {
        self.as_borrowed().repr()
    }

    pub fn call(&self, args: Option<Tuple<'_, 'py>>, kwds: Option<Dict<'_, 'py>>) -> PyResult<'py, Owned<'py>> {
        self.as_borrowed().call(args, kwds)
    }

    pub fn rich_compare(&self, other: Borrowed<'_, 'py>, op: CompareOp) -> PyResult<'py, Owned<'py>> {
        self.as_borrowed().rich_compare(other, op)
    }

    pub fn compare(&self, other: Borrowed<'_, 'py>) -> PyResult<'py, Ordering> {
        self.as_borrowed().compare(other)
    }

    pub fn is_true(&self) -> PyResult<'py, bool> {
        self.as_borrowed().is_true()
    }

    pub fn extract_i64(&self) -> PyResult<'py, i64> {
        self.as_borrowed().extract_i64()
    }

    pub fn refcnt(&self) -> isize {
        self.as_borrowed().refcnt()
    }

    pub fn type_name(&self) -> String {
        self.as_borrowed().type_name()
    }

    pub fn is(&self, other: Borrowed<'_, 'py>) -> bool {
        self.as_ptr() == other.as_ptr()
    }
}

impl Drop for Owned<'_> {
    fn drop(&mut self) {
        unsafe { sys::decref(self.ptr.as_ptr()) }
    }
}

impl Clone for Owned<'_> {
    fn clone(&self) -> Self {
        unsafe { sys::incref(self.ptr.as_ptr()) };
        Owned {
            ptr: self.ptr,
            _gil: PhantomData,
        }
    }
}

impl fmt::Debug for Owned<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.as_borrowed(), f)
    }
}

impl<'a, 'py> Borrowed<'a, 'py> {
    /// View a borrowed pointer; `None` for null
    ///
    /// # Safety
    /// - `ptr` must be null or point to an object alive for `'a`
    #[inline]
    pub unsafe fn from_ptr(_gil: Gil<'py>, ptr: *mut PyObject) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Borrowed {
            ptr,
            _marker: PhantomData,
        })
    }

    #[inline]
    pub(crate) fn from_nonnull(_gil: Gil<'py>, ptr: NonNull<PyObject>) -> Self {
        Borrowed {
            ptr,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn as_ptr(self) -> *mut PyObject {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn gil(self) -> Gil<'py> {
        unsafe { Gil::assume() }
    }

    /// A new owned reference to the same object
    pub fn to_owned(self) -> Owned<'py> {
        unsafe { sys::incref(self.as_ptr()) };
        Owned {
            ptr: self.ptr,
            _gil: PhantomData,
        }
    }

    fn text_of(self, obj: Owned<'py>) -> PyResult<'py, String> {
        let data = unsafe { sys::unicode_as_utf8(obj.as_ptr()) };
        if data.is_null() {
            return Err(capture_or_generic(self.gil(), "string conversion failed"));
        }
        Ok(unsafe { CStr::from_ptr(data) }.to_string_lossy().into_owned())
    }

    /// `str(self)` as Rust text
    pub fn str(self) -> PyResult<'py, String> {
        let obj = unsafe { obj_to_obj_err(self.gil(), sys::object_str(self.as_ptr()))? };
        self.text_of(obj)
    }

    /// `repr(self)` as Rust text
    pub fn repr(self) -> PyResult<'py, String> {
        let obj = unsafe { obj_to_obj_err(self.gil(), sys::object_repr(self.as_ptr()))? };
        self.text_of(obj)
    }

    /// `self(*args, **kwds)`; no arguments when `args` is `None`
    pub fn call(self, args: Option<Tuple<'_, 'py>>, kwds: Option<Dict<'_, 'py>>) -> PyResult<'py, Owned<'py>> {
        let args = args.map_or(core::ptr::null_mut(), |t| t.as_ptr());
        let kwds = kwds.map_or(core::ptr::null_mut(), |d| d.as_ptr());
        unsafe { obj_to_obj_err(self.gil(), sys::object_call(self.as_ptr(), args, kwds)) }
    }

    /// `self <op> other`
    pub fn rich_compare(self, other: Borrowed<'_, 'py>, op: CompareOp) -> PyResult<'py, Owned<'py>> {
        unsafe {
            obj_to_obj_err(
                self.gil(),
                sys::object_richcompare(self.as_ptr(), other.as_ptr(), op.as_raw()),
            )
        }
    }

    /// Three-way comparison through the interpreter
    pub fn compare(self, other: Borrowed<'_, 'py>) -> PyResult<'py, Ordering> {
        let rc = unsafe { sys::object_compare(self.as_ptr(), other.as_ptr()) };
        if rc == -1 {
            if let Some(err) = capture(self.gil()) {
                return Err(err);
            }
        }
        Ok(rc.cmp(&0))
    }

    pub fn is_true(self) -> PyResult<'py, bool> {
        let rc = unsafe { sys::object_is_true(self.as_ptr()) };
        crate::err::int_to_bool_err(self.gil(), rc)
    }

    pub fn extract_i64(self) -> PyResult<'py, i64> {
        let value = unsafe { sys::long_as_i64(self.as_ptr()) };
        if value == -1 {
            if let Some(err) = capture(self.gil()) {
                return Err(err);
            }
        }
        Ok(value)
    }

    pub fn refcnt(self) -> isize {
        unsafe { sys::refcnt(self.as_ptr()) }
    }

    pub fn is(self, other: Borrowed<'_, 'py>) -> bool {
        self.as_ptr() == other.as_ptr()
    }

    pub fn is_none(self) -> bool {
        self.as_ptr() == unsafe { sys::none() }
    }

    pub fn type_name(self) -> String {
        unsafe { sys::type_name(sys::type_of(self.as_ptr())) }
    }

    /// View as a tuple, or a `TypeError`
    pub fn as_tuple(self) -> PyResult<'py, Tuple<'a, 'py>> {
        if unsafe { sys::tuple_check(self.as_ptr()) } {
            Ok(unsafe { Tuple::from_ptr_unchecked(self.gil(), self.as_ptr()) })
        } else {
            Err(Error::type_error(
                self.gil(),
                format_args!("expected tuple, got {}", self.type_name()),
            ))
        }
    }

    /// View as a dict, or a `TypeError`
    pub fn as_dict(self) -> PyResult<'py, Dict<'a, 'py>> {
        if unsafe { sys::dict_check(self.as_ptr()) } {
            Ok(unsafe { Dict::from_ptr_unchecked(self.gil(), self.as_ptr()) })
        } else {
            Err(Error::type_error(
                self.gil(),
                format_args!("expected dict, got {}", self.type_name()),
            ))
        }
    }
}

impl fmt::Debug for Borrowed<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr() {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "<{} object at {:p}>", self.type_name(), self.as_ptr()),
        }
    }
}

/// Capture the pending exception, or make a generic error if none is set
pub(crate) fn capture_or_generic<'py>(gil: Gil<'py>, msg: &str) -> Error<'py> {
    capture(gil).unwrap_or_else(|| Error::generic(msg))
}

/// Ownership token for an instance being torn down
///
/// Handed to dealloc closures. Dropping it releases the instance memory
/// through the type's generic free, exactly once.
pub struct Dying<'py> {
    ptr: NonNull<PyObject>,
    _gil: PhantomData<Gil<'py>>,
}

impl<'py> Dying<'py> {
    /// # Safety
    /// - `ptr` must be an instance whose refcount reached zero
    pub(crate) unsafe fn new(_gil: Gil<'py>, ptr: NonNull<PyObject>) -> Self {
        Dying { ptr, _gil: PhantomData }
    }

    /// Raw pointer to the instance, valid until the token is dropped
    #[inline]
    pub fn as_ptr(&self) -> *mut PyObject {
        self.ptr.as_ptr()
    }

    pub fn type_name(&self) -> String {
        unsafe { sys::type_name(sys::type_of(self.as_ptr())) }
    }
}

impl Drop for Dying<'_> {
    fn drop(&mut self) {
        unsafe { sys::generic_free(self.ptr.as_ptr()) }
    }
}
