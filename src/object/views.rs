//! Typed views over argument tuples and keyword dicts

use core::ptr::{self, NonNull};
use std::ffi::CString;

use super::Borrowed;
use crate::err::{ssize_to_i64_err, PyResult};
use crate::gil::Gil;
use crate::sys::{self, PyObject};

/// Borrowed view of a tuple
#[derive(Clone, Copy)]
pub struct Tuple<'a, 'py>(Borrowed<'a, 'py>);

impl<'a, 'py> Tuple<'a, 'py> {
    /// # Safety
    /// - `ptr` must be a non-null tuple alive for `'a`
    pub unsafe fn from_ptr_unchecked(gil: Gil<'py>, ptr: *mut PyObject) -> Self {
        debug_assert!(!ptr.is_null());
        Tuple(Borrowed::from_nonnull(gil, NonNull::new_unchecked(ptr)))
    }

    #[inline]
    pub fn as_ptr(self) -> *mut PyObject {
        self.0.as_ptr()
    }

    #[inline]
    pub fn as_object(self) -> Borrowed<'a, 'py> {
        self.0
    }

    pub fn len(self) -> PyResult<'py, i64> {
        ssize_to_i64_err(self.0.gil(), unsafe { sys::tuple_size(self.as_ptr()) })
    }

    pub fn is_empty(self) -> PyResult<'py, bool> {
        Ok(self.len()? == 0)
    }

    /// Borrowed item at `index`, or the interpreter's `IndexError`
    pub fn get(self, index: usize) -> PyResult<'py, Borrowed<'a, 'py>> {
        let gil = self.0.gil();
        let item = unsafe { sys::tuple_get_item(self.as_ptr(), index as isize) };
        match unsafe { Borrowed::from_ptr(gil, item) } {
            Some(item) => Ok(item),
            None => Err(super::capture_or_generic(gil, "tuple item lookup failed")),
        }
    }

    pub fn iter(self) -> TupleIter<'a, 'py> {
        let len = unsafe { sys::tuple_size(self.as_ptr()) }.max(0);
        TupleIter {
            tuple: self,
            index: 0,
            len,
        }
    }
}

impl<'a, 'py> IntoIterator for Tuple<'a, 'py> {
    type Item = Borrowed<'a, 'py>;
    type IntoIter = TupleIter<'a, 'py>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl std::fmt::Debug for Tuple<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.0, f)
    }
}

/// Iterator over the items of a tuple
pub struct TupleIter<'a, 'py> {
    tuple: Tuple<'a, 'py>,
    index: isize,
    len: isize,
}

impl<'a, 'py> Iterator for TupleIter<'a, 'py> {
    type Item = Borrowed<'a, 'py>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.len {
            return None;
        }
        let item = unsafe { sys::tuple_get_item(self.tuple.as_ptr(), self.index) };
        self.index += 1;
        unsafe { Borrowed::from_ptr(self.tuple.0.gil(), item) }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.len - self.index).max(0) as usize;
        (remaining, Some(remaining))
    }
}

/// Borrowed view of a dict
#[derive(Clone, Copy)]
pub struct Dict<'a, 'py>(Borrowed<'a, 'py>);

impl<'a, 'py> Dict<'a, 'py> {
    /// # Safety
    /// - `ptr` must be a non-null dict alive for `'a`
    pub unsafe fn from_ptr_unchecked(gil: Gil<'py>, ptr: *mut PyObject) -> Self {
        debug_assert!(!ptr.is_null());
        Dict(Borrowed::from_nonnull(gil, NonNull::new_unchecked(ptr)))
    }

    #[inline]
    pub fn as_ptr(self) -> *mut PyObject {
        self.0.as_ptr()
    }

    #[inline]
    pub fn as_object(self) -> Borrowed<'a, 'py> {
        self.0
    }

    pub fn len(self) -> PyResult<'py, i64> {
        ssize_to_i64_err(self.0.gil(), unsafe { sys::dict_size(self.as_ptr()) })
    }

    pub fn is_empty(self) -> PyResult<'py, bool> {
        Ok(self.len()? == 0)
    }

    /// Borrowed value for a string key
    pub fn get(self, key: &str) -> Option<Borrowed<'a, 'py>> {
        let key = CString::new(key).ok()?;
        let value = unsafe { sys::dict_get_item_string(self.as_ptr(), key.as_ptr()) };
        unsafe { Borrowed::from_ptr(self.0.gil(), value) }
    }

    pub fn iter(self) -> DictIter<'a, 'py> {
        DictIter { dict: self, pos: 0 }
    }
}

impl<'a, 'py> IntoIterator for Dict<'a, 'py> {
    type Item = (Borrowed<'a, 'py>, Borrowed<'a, 'py>);
    type IntoIter = DictIter<'a, 'py>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl std::fmt::Debug for Dict<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.0, f)
    }
}

/// Iterator over the (key, value) pairs of a dict
pub struct DictIter<'a, 'py> {
    dict: Dict<'a, 'py>,
    pos: isize,
}

impl<'a, 'py> Iterator for DictIter<'a, 'py> {
    type Item = (Borrowed<'a, 'py>, Borrowed<'a, 'py>);

    fn next(&mut self) -> Option<Self::Item> {
        let (mut key, mut value) = (ptr::null_mut(), ptr::null_mut());
        if !unsafe { sys::dict_next(self.dict.as_ptr(), &mut self.pos, &mut key, &mut value) } {
            return None;
        }
        let gil = self.dict.0.gil();
        unsafe { Some((Borrowed::from_ptr(gil, key)?, Borrowed::from_ptr(gil, value)?)) }
    }
}
