//! Backend over the bundled `pyslot-runtime` interpreter

use core::ffi::{c_char, c_int};
use std::ffi::CStr;

use pyslot_runtime::builtins as rt_builtins;
use pyslot_runtime::exceptions as rt_exc;
use pyslot_runtime::object as rt_object;

use super::{BuiltinExc, SlotTable};

pub use pyslot_runtime::{PyObject, PyTypeObject};

/// Whether the backend implements the three-way compare slot
pub const SUPPORTS_COMPARE: bool = true;

/// Lock state returned by `gil_ensure`, handed back to `gil_release`
pub type GilState = c_int;

pub fn initialize() {
    pyslot_runtime::pyrt_initialize();
}

pub unsafe fn gil_ensure() -> GilState {
    pyslot_runtime::pyrt_gil_ensure()
}

pub unsafe fn gil_release(_state: GilState) {
    pyslot_runtime::pyrt_gil_release();
}

pub fn gil_check() -> bool {
    pyslot_runtime::pyrt_gil_check()
}

// Exception state

pub unsafe fn err_occurred() -> *mut PyObject {
    pyslot_runtime::pyrt_err_occurred()
}

pub unsafe fn err_fetch(
    kind: &mut *mut PyObject,
    value: &mut *mut PyObject,
    traceback: &mut *mut PyObject,
) {
    pyslot_runtime::pyrt_err_fetch(kind, value, traceback)
}

pub unsafe fn err_restore(kind: *mut PyObject, value: *mut PyObject, traceback: *mut PyObject) {
    pyslot_runtime::pyrt_err_restore(kind, value, traceback)
}

pub unsafe fn err_set_string(kind: *mut PyObject, msg: *const c_char) {
    pyslot_runtime::pyrt_err_set_string(kind, msg)
}

pub unsafe fn err_clear() {
    pyslot_runtime::pyrt_err_clear()
}

pub unsafe fn exc(kind: BuiltinExc) -> *mut PyObject {
    match kind {
        BuiltinExc::Exception => rt_exc::exception(),
        BuiltinExc::TypeError => rt_exc::type_error(),
        BuiltinExc::KeyError => rt_exc::key_error(),
        BuiltinExc::AttributeError => rt_exc::attribute_error(),
        BuiltinExc::NotImplementedError => rt_exc::not_implemented_error(),
        BuiltinExc::SystemError => rt_exc::system_error(),
    }
}

// Reference counting

pub unsafe fn incref(obj: *mut PyObject) {
    rt_object::pyrt_incref(obj)
}

pub unsafe fn decref(obj: *mut PyObject) {
    rt_object::pyrt_decref(obj)
}

pub unsafe fn refcnt(obj: *mut PyObject) -> isize {
    rt_object::pyrt_refcnt(obj)
}

// Object protocol

pub unsafe fn object_str(obj: *mut PyObject) -> *mut PyObject {
    rt_object::pyrt_object_str(obj)
}

pub unsafe fn object_repr(obj: *mut PyObject) -> *mut PyObject {
    rt_object::pyrt_object_repr(obj)
}

pub unsafe fn object_call(
    obj: *mut PyObject,
    args: *mut PyObject,
    kwds: *mut PyObject,
) -> *mut PyObject {
    rt_object::pyrt_object_call(obj, args, kwds)
}

pub unsafe fn object_richcompare(a: *mut PyObject, b: *mut PyObject, op: c_int) -> *mut PyObject {
    rt_object::pyrt_object_richcompare(a, b, op)
}

pub unsafe fn object_compare(a: *mut PyObject, b: *mut PyObject) -> c_int {
    rt_object::pyrt_object_compare(a, b)
}

pub unsafe fn object_is_true(obj: *mut PyObject) -> c_int {
    rt_object::pyrt_object_is_true(obj)
}

pub unsafe fn is_subclass(derived: *mut PyObject, base: *mut PyObject) -> c_int {
    rt_object::pyrt_object_is_subclass(derived, base)
}

// Types

pub unsafe fn type_of(obj: *mut PyObject) -> *mut PyTypeObject {
    rt_object::pyrt_type_of(obj)
}

pub unsafe fn type_name(tp: *mut PyTypeObject) -> String {
    rt_object::type_name(tp).to_owned()
}

pub unsafe fn type_new(name: &'static CStr, basicsize: usize, slots: &SlotTable) -> *mut PyTypeObject {
    let table = pyslot_runtime::TypeSlots {
        dealloc: slots.dealloc,
        call: slots.call,
        compare: slots.compare,
        init: slots.init,
        repr: slots.repr,
        str: slots.str,
        richcompare: slots.richcompare,
        free: None,
    };
    rt_object::pyrt_type_new(name.as_ptr(), basicsize, &table)
}

pub unsafe fn type_alloc(tp: *mut PyTypeObject) -> *mut PyObject {
    rt_object::pyrt_type_generic_alloc(tp)
}

pub unsafe fn type_call(
    tp: *mut PyTypeObject,
    args: *mut PyObject,
    kwds: *mut PyObject,
) -> *mut PyObject {
    rt_object::pyrt_type_call(tp, args, kwds)
}

/// Release the memory of an instance whose refcount reached zero
pub unsafe fn generic_free(obj: *mut PyObject) {
    rt_object::pyrt_object_del(obj)
}

// Builtin values

pub unsafe fn none() -> *mut PyObject {
    rt_builtins::pyrt_none()
}

pub unsafe fn not_implemented() -> *mut PyObject {
    rt_builtins::pyrt_not_implemented()
}

pub unsafe fn bool_from(value: bool) -> *mut PyObject {
    rt_builtins::pyrt_bool_from_long(value as i64)
}

pub unsafe fn unicode_from_string(s: *const c_char) -> *mut PyObject {
    rt_builtins::pyrt_unicode_from_string(s)
}

pub unsafe fn unicode_as_utf8(obj: *mut PyObject) -> *const c_char {
    rt_builtins::pyrt_unicode_as_utf8(obj)
}

pub unsafe fn long_from_i64(value: i64) -> *mut PyObject {
    rt_builtins::pyrt_long_from_i64(value)
}

pub unsafe fn long_as_i64(obj: *mut PyObject) -> i64 {
    rt_builtins::pyrt_long_as_i64(obj)
}

pub unsafe fn tuple_new(len: isize) -> *mut PyObject {
    rt_builtins::pyrt_tuple_new(len)
}

pub unsafe fn tuple_check(obj: *mut PyObject) -> bool {
    rt_builtins::pyrt_tuple_check(obj)
}

pub unsafe fn tuple_size(obj: *mut PyObject) -> isize {
    rt_builtins::pyrt_tuple_size(obj)
}

pub unsafe fn tuple_get_item(obj: *mut PyObject, index: isize) -> *mut PyObject {
    rt_builtins::pyrt_tuple_get_item(obj, index)
}

pub unsafe fn tuple_set_item(obj: *mut PyObject, index: isize, item: *mut PyObject) -> c_int {
    rt_builtins::pyrt_tuple_set_item(obj, index, item)
}

pub unsafe fn dict_new() -> *mut PyObject {
    rt_builtins::pyrt_dict_new()
}

pub unsafe fn dict_check(obj: *mut PyObject) -> bool {
    rt_builtins::pyrt_dict_check(obj)
}

pub unsafe fn dict_size(obj: *mut PyObject) -> isize {
    rt_builtins::pyrt_dict_size(obj)
}

pub unsafe fn dict_set_item_string(
    obj: *mut PyObject,
    key: *const c_char,
    value: *mut PyObject,
) -> c_int {
    rt_builtins::pyrt_dict_set_item_string(obj, key, value)
}

pub unsafe fn dict_get_item_string(obj: *mut PyObject, key: *const c_char) -> *mut PyObject {
    rt_builtins::pyrt_dict_get_item_string(obj, key)
}

pub unsafe fn dict_next(
    obj: *mut PyObject,
    pos: &mut isize,
    key: &mut *mut PyObject,
    value: &mut *mut PyObject,
) -> bool {
    rt_builtins::pyrt_dict_next(obj, pos, key, value) != 0
}
