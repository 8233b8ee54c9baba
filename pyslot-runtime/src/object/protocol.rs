//! Object protocol - generic operations dispatched through type slots
//!
//! Each operation looks up the slot on the object's type and falls back to
//! a default when the slot is empty. Failures follow the C convention: a
//! null or -1 result with the pending exception set.

use core::ffi::c_int;
use core::ptr;
use std::cmp::Ordering;

use super::{pyrt_decref, pyrt_incref, pyrt_type_generic_alloc, pyrt_type_is_subtype, type_name};
use super::{PyObject, PyTypeObject};
use crate::builtins::int::{is_int, new_bool};
use crate::builtins::singletons::pyrt_not_implemented;
use crate::builtins::string::{is_str, new_str};
use crate::builtins::tuple::pyrt_tuple_new;
use crate::errors::{pyrt_err_occurred, set_error};
use crate::exceptions::{system_error, type_error};

/// Rich comparison operators
pub const PY_LT: c_int = 0;
pub const PY_LE: c_int = 1;
pub const PY_EQ: c_int = 2;
pub const PY_NE: c_int = 3;
pub const PY_GT: c_int = 4;
pub const PY_GE: c_int = 5;

/// Whether `ordering` satisfies the rich comparison `op`
///
/// Unknown operators never match.
#[inline]
pub fn ordering_matches(ordering: Ordering, op: c_int) -> bool {
    match op {
        PY_LT => ordering == Ordering::Less,
        PY_LE => ordering != Ordering::Greater,
        PY_EQ => ordering == Ordering::Equal,
        PY_NE => ordering != Ordering::Equal,
        PY_GT => ordering == Ordering::Greater,
        PY_GE => ordering != Ordering::Less,
        _ => false,
    }
}

fn op_symbol(op: c_int) -> &'static str {
    match op {
        PY_LT => "<",
        PY_LE => "<=",
        PY_EQ => "==",
        PY_NE => "!=",
        PY_GT => ">",
        _ => ">=",
    }
}

fn swapped_op(op: c_int) -> c_int {
    match op {
        PY_LT => PY_GT,
        PY_LE => PY_GE,
        PY_GT => PY_LT,
        PY_GE => PY_LE,
        other => other,
    }
}

#[inline]
unsafe fn tp(obj: *mut PyObject) -> *mut PyTypeObject {
    (*obj).ob_type
}

unsafe fn null_argument() -> *mut PyObject {
    if pyrt_err_occurred().is_null() {
        set_error(system_error(), "null argument to internal routine");
    }
    ptr::null_mut()
}

/// Check a slot's result: non-null results must be strings
unsafe fn expect_str(result: *mut PyObject, what: &str) -> *mut PyObject {
    if result.is_null() {
        if pyrt_err_occurred().is_null() {
            set_error(system_error(), &format!("{} returned NULL without setting an error", what));
        }
        return ptr::null_mut();
    }
    if !is_str(result) {
        let got = type_name(tp(result));
        pyrt_decref(result);
        set_error(type_error(), &format!("{} returned non-string (type {})", what, got));
        return ptr::null_mut();
    }
    result
}

/// `repr(obj)` (new reference)
///
/// Types without a repr slot get `<Name object at 0x...>`.
///
/// # Safety
/// - `obj` must be null or a valid object
#[no_mangle]
pub unsafe extern "C" fn pyrt_object_repr(obj: *mut PyObject) -> *mut PyObject {
    if obj.is_null() {
        return new_str("<NULL>");
    }

    match (*tp(obj)).tp_slots.repr {
        Some(repr) => expect_str(repr(obj), "__repr__"),
        None => new_str(&format!("<{} object at {:p}>", type_name(tp(obj)), obj)),
    }
}

/// `str(obj)` (new reference)
///
/// Strings are returned as-is; types without a str slot fall back to repr.
///
/// # Safety
/// - `obj` must be null or a valid object
#[no_mangle]
pub unsafe extern "C" fn pyrt_object_str(obj: *mut PyObject) -> *mut PyObject {
    if obj.is_null() {
        return new_str("<NULL>");
    }
    if is_str(obj) {
        pyrt_incref(obj);
        return obj;
    }

    match (*tp(obj)).tp_slots.str {
        Some(str_slot) => expect_str(str_slot(obj), "__str__"),
        None => pyrt_object_repr(obj),
    }
}

/// `obj(*args, **kwds)` (new reference)
///
/// A null `args` is treated as an empty tuple.
///
/// # Safety
/// - `obj` must be a valid object
/// - `args` must be null or a tuple, `kwds` null or a dict
#[no_mangle]
pub unsafe extern "C" fn pyrt_object_call(
    obj: *mut PyObject,
    args: *mut PyObject,
    kwds: *mut PyObject,
) -> *mut PyObject {
    if obj.is_null() {
        return null_argument();
    }
    let Some(call) = (*tp(obj)).tp_slots.call else {
        set_error(
            type_error(),
            &format!("'{}' object is not callable", type_name(tp(obj))),
        );
        return ptr::null_mut();
    };

    let empty = if args.is_null() { pyrt_tuple_new(0) } else { ptr::null_mut() };
    let result = call(obj, if args.is_null() { empty } else { args }, kwds);
    pyrt_decref(empty);

    if result.is_null() && pyrt_err_occurred().is_null() {
        set_error(system_error(), "call returned NULL without setting an error");
    }
    result
}

/// Run the init slot of `obj`; 0 on success, -1 with an exception set
///
/// Types without an init slot accept any arguments.
///
/// # Safety
/// - `obj` must be a valid object
/// - `args` must be null or a tuple, `kwds` null or a dict
#[no_mangle]
pub unsafe extern "C" fn pyrt_object_init(
    obj: *mut PyObject,
    args: *mut PyObject,
    kwds: *mut PyObject,
) -> c_int {
    if obj.is_null() {
        null_argument();
        return -1;
    }
    let Some(init) = (*tp(obj)).tp_slots.init else {
        return 0;
    };

    let empty = if args.is_null() { pyrt_tuple_new(0) } else { ptr::null_mut() };
    let rc = init(obj, if args.is_null() { empty } else { args }, kwds);
    pyrt_decref(empty);

    if rc < 0 {
        if pyrt_err_occurred().is_null() {
            set_error(system_error(), "__init__ failed without setting an error");
        }
        return -1;
    }
    0
}

/// Instantiate `tp`: allocate, then run its init slot (new reference)
///
/// # Safety
/// - `tp` must be a valid type object
/// - `args` must be null or a tuple, `kwds` null or a dict
#[no_mangle]
pub unsafe extern "C" fn pyrt_type_call(
    tp: *mut PyTypeObject,
    args: *mut PyObject,
    kwds: *mut PyObject,
) -> *mut PyObject {
    let obj = pyrt_type_generic_alloc(tp);
    if obj.is_null() {
        return null_argument();
    }
    if pyrt_object_init(obj, args, kwds) < 0 {
        pyrt_decref(obj);
        return ptr::null_mut();
    }
    obj
}

/// Three-way compare: -1, 0 or 1
///
/// Uses the compare slot of `a` when both operands share a type, then
/// falls back to identity and address order. On error the result is -1
/// with the exception pending; an exception already pending before the
/// call does not turn a successful slot result into an error.
///
/// # Safety
/// - both must be valid objects
#[no_mangle]
pub unsafe extern "C" fn pyrt_object_compare(a: *mut PyObject, b: *mut PyObject) -> c_int {
    if a.is_null() || b.is_null() {
        null_argument();
        return -1;
    }
    if a == b {
        return 0;
    }

    if tp(a) == tp(b) {
        if let Some(compare) = (*tp(a)).tp_slots.compare {
            let rc = compare(a, b);
            if rc == -1 && !pyrt_err_occurred().is_null() {
                return -1;
            }
            return rc.clamp(-1, 1);
        }
    }

    match (a as usize).cmp(&(b as usize)) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

unsafe fn try_richcompare(
    a: *mut PyObject,
    b: *mut PyObject,
    op: c_int,
) -> Option<*mut PyObject> {
    let richcompare = (*tp(a)).tp_slots.richcompare?;
    let result = richcompare(a, b, op);
    if result == pyrt_not_implemented() {
        pyrt_decref(result);
        return None;
    }
    Some(result)
}

/// Rich comparison `a <op> b` (new reference)
///
/// Tries `a`'s slot, then `b`'s slot with the reflected operator; `==` and
/// `!=` fall back to identity.
///
/// # Safety
/// - both must be valid objects
#[no_mangle]
pub unsafe extern "C" fn pyrt_object_richcompare(
    a: *mut PyObject,
    b: *mut PyObject,
    op: c_int,
) -> *mut PyObject {
    if a.is_null() || b.is_null() {
        return null_argument();
    }
    if !(PY_LT..=PY_GE).contains(&op) {
        set_error(system_error(), &format!("bad rich comparison operator {}", op));
        return ptr::null_mut();
    }

    if let Some(result) = try_richcompare(a, b, op) {
        return result;
    }
    if tp(a) != tp(b) {
        if let Some(result) = try_richcompare(b, a, swapped_op(op)) {
            return result;
        }
    }

    match op {
        PY_EQ => new_bool(a == b),
        PY_NE => new_bool(a != b),
        _ => {
            set_error(
                type_error(),
                &format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    op_symbol(op),
                    type_name(tp(a)),
                    type_name(tp(b)),
                ),
            );
            ptr::null_mut()
        }
    }
}

/// Truth value: 1, 0, or -1 with an exception set
///
/// `None`, `False` and zero are false, empty strings are false, everything
/// else is true.
///
/// # Safety
/// - `obj` must be a valid object
#[no_mangle]
pub unsafe extern "C" fn pyrt_object_is_true(obj: *mut PyObject) -> c_int {
    if obj.is_null() {
        null_argument();
        return -1;
    }
    if obj == crate::builtins::singletons::pyrt_none() {
        return 0;
    }
    if is_int(obj) {
        return (crate::builtins::int::pyrt_long_as_i64(obj) != 0) as c_int;
    }
    if let Some(text) = crate::builtins::string::as_str(obj) {
        return (!text.is_empty()) as c_int;
    }
    1
}

/// Whether `derived` is `base` or a subclass of it, for type objects
///
/// Returns -1 with `TypeError` set when either argument is not a type.
///
/// # Safety
/// - both must be valid objects
#[no_mangle]
pub unsafe extern "C" fn pyrt_object_is_subclass(derived: *mut PyObject, base: *mut PyObject) -> c_int {
    if derived.is_null() || base.is_null() {
        null_argument();
        return -1;
    }
    if !super::is_type(derived) || !super::is_type(base) {
        set_error(type_error(), "issubclass() arguments must be classes");
        return -1;
    }
    pyrt_type_is_subtype(derived as *mut PyTypeObject, base as *mut PyTypeObject) as c_int
}
