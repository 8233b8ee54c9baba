//! Exception classes
//!
//! Design: exception classes are immortal type objects linked through
//! `tp_base`, so class matching is a walk up the base chain. Raised
//! exceptions carry a string value rather than an instance.

use core::ptr;
use std::ffi::CStr;

use once_cell::sync::Lazy;

use crate::object::{new_static_type, PyObject, PyTypeObject, StaticPtr, TypeSlots, TPFLAGS_EXCEPTION};

fn exception_type(name: &'static CStr, base: *mut PyTypeObject) -> StaticPtr<PyTypeObject> {
    new_static_type(
        name,
        core::mem::size_of::<PyObject>(),
        TPFLAGS_EXCEPTION,
        base,
        TypeSlots::default(),
    )
}

macro_rules! exception_types {
    ($($cell:ident, $getter:ident, $export:ident = $name:literal : $base:expr;)*) => {
        $(
            static $cell: Lazy<StaticPtr<PyTypeObject>> =
                Lazy::new(|| exception_type(crate::object::cstr!($name), $base));

            #[doc = concat!("The `", $name, "` class (borrowed)")]
            #[inline]
            pub fn $getter() -> *mut PyObject {
                $cell.as_ptr() as *mut PyObject
            }

            #[doc = concat!("The `", $name, "` class (borrowed), C ABI")]
            #[no_mangle]
            pub extern "C" fn $export() -> *mut PyObject {
                $getter()
            }
        )*

        /// Initialize exception classes
        pub fn init() {
            $( Lazy::force(&$cell); )*
        }
    };
}

exception_types! {
    EXCEPTION, exception, pyrt_exc_exception = "Exception": ptr::null_mut();
    TYPE_ERROR, type_error, pyrt_exc_type_error = "TypeError": EXCEPTION.as_ptr();
    LOOKUP_ERROR, lookup_error, pyrt_exc_lookup_error = "LookupError": EXCEPTION.as_ptr();
    KEY_ERROR, key_error, pyrt_exc_key_error = "KeyError": LOOKUP_ERROR.as_ptr();
    INDEX_ERROR, index_error, pyrt_exc_index_error = "IndexError": LOOKUP_ERROR.as_ptr();
    ATTRIBUTE_ERROR, attribute_error, pyrt_exc_attribute_error = "AttributeError": EXCEPTION.as_ptr();
    RUNTIME_ERROR, runtime_error, pyrt_exc_runtime_error = "RuntimeError": EXCEPTION.as_ptr();
    NOT_IMPLEMENTED_ERROR, not_implemented_error, pyrt_exc_not_implemented_error =
        "NotImplementedError": RUNTIME_ERROR.as_ptr();
    SYSTEM_ERROR, system_error, pyrt_exc_system_error = "SystemError": EXCEPTION.as_ptr();
    VALUE_ERROR, value_error, pyrt_exc_value_error = "ValueError": EXCEPTION.as_ptr();
}
