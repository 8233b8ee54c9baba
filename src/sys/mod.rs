//! Interpreter ABI - the raw surface the bridge is written against
//!
//! Design: one flat set of `unsafe fn`s over raw object pointers, backed by
//! either the bundled `pyslot-runtime` (default) or CPython through
//! `pyo3::ffi` (`python` feature). Everything above this module is backend
//! agnostic. Reference conventions follow the C API: "new" results are owned
//! by the caller, "borrowed" results are not.

use core::ffi::c_int;

#[cfg(not(feature = "python"))]
mod runtime;
#[cfg(not(feature = "python"))]
pub use runtime::*;

#[cfg(feature = "python")]
mod cpython;
#[cfg(feature = "python")]
pub use cpython::*;

/// Builtin exception classes the bridge raises or matches against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinExc {
    Exception,
    TypeError,
    KeyError,
    AttributeError,
    NotImplementedError,
    SystemError,
}

impl BuiltinExc {
    pub fn name(self) -> &'static str {
        match self {
            Self::Exception => "Exception",
            Self::TypeError => "TypeError",
            Self::KeyError => "KeyError",
            Self::AttributeError => "AttributeError",
            Self::NotImplementedError => "NotImplementedError",
            Self::SystemError => "SystemError",
        }
    }
}

pub type Destructor = unsafe extern "C" fn(*mut PyObject);
pub type TernaryFunc =
    unsafe extern "C" fn(*mut PyObject, *mut PyObject, *mut PyObject) -> *mut PyObject;
pub type CmpFunc = unsafe extern "C" fn(*mut PyObject, *mut PyObject) -> c_int;
pub type InitProc = unsafe extern "C" fn(*mut PyObject, *mut PyObject, *mut PyObject) -> c_int;
pub type ReprFunc = unsafe extern "C" fn(*mut PyObject) -> *mut PyObject;
pub type RichCmpFunc = unsafe extern "C" fn(*mut PyObject, *mut PyObject, c_int) -> *mut PyObject;

/// Entry points installed on a new extension type
#[derive(Clone, Copy, Default)]
pub struct SlotTable {
    pub dealloc: Option<Destructor>,
    pub call: Option<TernaryFunc>,
    pub compare: Option<CmpFunc>,
    pub init: Option<InitProc>,
    pub repr: Option<ReprFunc>,
    pub str: Option<ReprFunc>,
    pub richcompare: Option<RichCmpFunc>,
}

/// Rich comparison operator codes shared by both backends
pub const PY_LT: c_int = 0;
pub const PY_LE: c_int = 1;
pub const PY_EQ: c_int = 2;
pub const PY_NE: c_int = 3;
pub const PY_GT: c_int = 4;
pub const PY_GE: c_int = 5;
