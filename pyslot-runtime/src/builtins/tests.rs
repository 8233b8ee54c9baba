//! Test suite for builtin types

use super::*;
use super::string::{as_str, str_equals};
use crate::errors::{pyrt_err_clear, pyrt_err_occurred};
use crate::exceptions::{index_error, type_error, value_error};
use crate::gil::with_lock;
use crate::object::{pyrt_decref, pyrt_incref, pyrt_object_repr, pyrt_refcnt, PyObject, IMMORTAL_REFCNT};

use core::ffi::c_char;
use core::ptr;

unsafe fn repr_of(obj: *mut PyObject) -> String {
    let repr = pyrt_object_repr(obj);
    let text = as_str(repr).unwrap_or("<error>").to_owned();
    pyrt_decref(repr);
    text
}

#[test]
fn test_str_truncates_at_nul() {
    with_lock(|| unsafe {
        let s = new_str("abc\0def");
        assert_eq!(as_str(s), Some("abc"));
        assert!(str_equals(s, "abc"));
        pyrt_decref(s);
    });
}

#[test]
fn test_unicode_from_invalid_utf8() {
    with_lock(|| unsafe {
        pyrt_err_clear();
        let bad = [0xffu8, 0xfe, 0];
        assert!(pyrt_unicode_from_string(bad.as_ptr() as *const c_char).is_null());
        assert_eq!(pyrt_err_occurred(), value_error());
        pyrt_err_clear();
    });
}

#[test]
fn test_unicode_as_utf8_type_check() {
    with_lock(|| unsafe {
        pyrt_err_clear();
        let n = pyrt_long_from_i64(5);
        assert!(pyrt_unicode_as_utf8(n).is_null());
        assert_eq!(pyrt_err_occurred(), type_error());
        pyrt_err_clear();
        pyrt_decref(n);
    });
}

#[test]
fn test_str_repr_escapes_quotes() {
    with_lock(|| unsafe {
        let s = new_str("it's");
        assert_eq!(repr_of(s), "'it\\'s'");
        pyrt_decref(s);
    });
}

#[test]
fn test_bool_singletons() {
    with_lock(|| unsafe {
        let t = pyrt_bool_from_long(7);
        assert_eq!(t, pyrt_true());
        assert_eq!(repr_of(t), "True");
        assert_eq!(pyrt_long_as_i64(t), 1);
        pyrt_decref(t);

        assert_eq!(repr_of(pyrt_false()), "False");
        assert!(pyrt_refcnt(pyrt_true()) > IMMORTAL_REFCNT / 2);
    });
}

#[test]
fn test_long_as_i64_rejects_str() {
    with_lock(|| unsafe {
        pyrt_err_clear();
        let s = new_str("12");
        assert_eq!(pyrt_long_as_i64(s), -1);
        assert_eq!(pyrt_err_occurred(), type_error());
        pyrt_err_clear();
        pyrt_decref(s);
    });
}

#[test]
fn test_tuple_items_and_repr() {
    with_lock(|| unsafe {
        pyrt_err_clear();
        let t = pyrt_tuple_new(2);
        assert_eq!(pyrt_tuple_set_item(t, 0, pyrt_long_from_i64(1)), 0);
        assert_eq!(pyrt_tuple_set_item(t, 1, new_str("x")), 0);
        assert_eq!(pyrt_tuple_size(t), 2);
        assert_eq!(repr_of(t), "(1, 'x')");

        let single = pyrt_tuple_new(1);
        pyrt_incref(pyrt_none());
        pyrt_tuple_set_item(single, 0, pyrt_none());
        assert_eq!(repr_of(single), "(None,)");

        pyrt_decref(single);
        pyrt_decref(t);
    });
}

#[test]
fn test_tuple_index_errors() {
    with_lock(|| unsafe {
        pyrt_err_clear();
        let t = pyrt_tuple_new(1);
        assert!(pyrt_tuple_get_item(t, 3).is_null());
        assert_eq!(pyrt_err_occurred(), index_error());
        pyrt_err_clear();

        // The item is stolen even when the store fails
        let item = new_str("lost");
        pyrt_incref(item);
        assert_eq!(pyrt_tuple_set_item(t, -1, item), -1);
        assert_eq!(pyrt_refcnt(item), 1);
        pyrt_err_clear();

        pyrt_decref(item);
        pyrt_decref(t);
    });
}

#[test]
fn test_tuple_new_negative() {
    with_lock(|| {
        pyrt_err_clear();
        assert!(pyrt_tuple_new(-1).is_null());
        assert!(!pyrt_err_occurred().is_null());
        pyrt_err_clear();
    });
}

#[test]
fn test_dict_set_get_replace() {
    with_lock(|| unsafe {
        pyrt_err_clear();
        let d = pyrt_dict_new();
        let v1 = pyrt_long_from_i64(1);
        let v2 = pyrt_long_from_i64(2);

        assert_eq!(pyrt_dict_set_item_string(d, b"a\0".as_ptr() as *const c_char, v1), 0);
        assert_eq!(pyrt_refcnt(v1), 2);
        assert_eq!(pyrt_dict_set_item_string(d, b"a\0".as_ptr() as *const c_char, v2), 0);
        assert_eq!(pyrt_refcnt(v1), 1);
        assert_eq!(pyrt_dict_size(d), 1);

        let got = pyrt_dict_get_item_string(d, b"a\0".as_ptr() as *const c_char);
        assert_eq!(got, v2);
        assert!(pyrt_dict_get_item_string(d, b"b\0".as_ptr() as *const c_char).is_null());
        assert!(pyrt_err_occurred().is_null());

        assert_eq!(repr_of(d), "{'a': 2}");

        pyrt_decref(d);
        pyrt_decref(v1);
        pyrt_decref(v2);
    });
}

#[test]
fn test_dict_rejects_non_str_keys() {
    with_lock(|| unsafe {
        pyrt_err_clear();
        let d = pyrt_dict_new();
        let k = pyrt_long_from_i64(1);
        assert_eq!(pyrt_dict_set_item(d, k, k), -1);
        assert_eq!(pyrt_err_occurred(), type_error());
        pyrt_err_clear();
        pyrt_decref(k);
        pyrt_decref(d);
    });
}

#[test]
fn test_dict_next_walks_in_insertion_order() {
    with_lock(|| unsafe {
        let d = pyrt_dict_new();
        for (i, key) in ["x\0", "y\0", "z\0"].iter().enumerate() {
            let v = pyrt_long_from_i64(i as i64);
            pyrt_dict_set_item_string(d, key.as_ptr() as *const c_char, v);
            pyrt_decref(v);
        }

        let mut pos = 0isize;
        let (mut k, mut v) = (ptr::null_mut(), ptr::null_mut());
        let mut seen = Vec::new();
        while pyrt_dict_next(d, &mut pos, &mut k, &mut v) != 0 {
            seen.push((as_str(k).unwrap_or("").to_owned(), pyrt_long_as_i64(v)));
        }
        assert_eq!(
            seen,
            vec![("x".to_owned(), 0), ("y".to_owned(), 1), ("z".to_owned(), 2)]
        );
        pyrt_decref(d);
    });
}

#[test]
fn test_singleton_reprs() {
    with_lock(|| unsafe {
        assert_eq!(repr_of(pyrt_none()), "None");
        assert_eq!(repr_of(pyrt_not_implemented()), "NotImplemented");
    });
}
