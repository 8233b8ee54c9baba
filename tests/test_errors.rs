//! Error translation between the pending exception and `Error`

use std::ptr;

use proptest::prelude::*;

use pyslot::sys;
use pyslot::{
    capture, clear, exception_raised, int_to_bool_err, int_to_err, obj_to_obj_err, raise_format,
    ssize_to_i64_err, with_gil, BuiltinExc, ClassBuilder, Error, ExcKind, Gil, Owned,
};

fn class_refcnt(exc: BuiltinExc) -> isize {
    unsafe { sys::refcnt(sys::exc(exc)) }
}

fn raise_key_error(gil: Gil<'_>) {
    Error::key_error(gil, "pending").raise(gil);
}

#[test]
fn test_capture_without_exception() {
    with_gil(|gil| {
        clear(gil);
        assert!(!exception_raised(gil));
        assert!(capture(gil).is_none());
        assert!(!exception_raised(gil));
    });
}

#[test]
fn test_typed_constructors_round_trip() {
    with_gil(|gil| {
        clear(gil);
        let cases: [(Error<'_>, BuiltinExc, ExcKind); 4] = [
            (Error::type_error(gil, "bad type"), BuiltinExc::TypeError, ExcKind::TypeError),
            (Error::key_error(gil, "bad key"), BuiltinExc::KeyError, ExcKind::KeyError),
            (
                Error::attribute_error(gil, "bad attribute"),
                BuiltinExc::AttributeError,
                ExcKind::AttributeError,
            ),
            (
                Error::not_implemented(gil, "not yet"),
                BuiltinExc::NotImplementedError,
                ExcKind::NotImplementedError,
            ),
        ];

        for (err, exc, kind) in cases {
            assert_eq!(err.kind(), kind);
            assert_eq!(err.name(), exc.name());
            assert!(err.class().is_some());
            let msg = err.message().to_owned();

            err.raise(gil);
            assert!(exception_raised(gil));

            let captured = capture(gil).unwrap();
            assert!(!exception_raised(gil));
            assert_eq!(captured.kind(), ExcKind::Captured);
            assert_eq!(captured.name(), exc.name());
            assert_eq!(captured.message(), msg);
            assert!(captured.is_instance(gil, exc));
            assert!(captured.is_instance(gil, BuiltinExc::Exception));
        }
    });
}

#[test]
fn test_generic_raises_base_exception() {
    with_gil(|gil| {
        clear(gil);
        let err = Error::generic("something broke");
        assert_eq!(err.kind(), ExcKind::Generic);
        assert!(err.class().is_none());
        assert!(err.is_instance(gil, BuiltinExc::Exception));
        assert!(!err.is_instance(gil, BuiltinExc::TypeError));

        err.raise(gil);
        let captured = capture(gil).unwrap();
        assert_eq!(captured.name(), "Exception");
        assert_eq!(captured.message(), "something broke");
        assert!(!captured.is_instance(gil, BuiltinExc::KeyError));
    });
}

#[test]
fn test_raise_replaces_pending() {
    with_gil(|gil| {
        clear(gil);
        raise_key_error(gil);
        Error::attribute_error(gil, "newer").raise(gil);

        let captured = capture(gil).unwrap();
        assert!(captured.is_instance(gil, BuiltinExc::AttributeError));
        assert_eq!(captured.message(), "newer");
        assert!(capture(gil).is_none());
    });
}

#[test]
fn test_raise_truncates_message_at_nul() {
    with_gil(|gil| {
        clear(gil);
        Error::type_error(gil, "visible\0hidden").raise(gil);
        assert_eq!(capture(gil).unwrap().message(), "visible");
    });
}

#[test]
fn test_class_refcount_balanced() {
    with_gil(|gil| {
        clear(gil);
        let before = class_refcnt(BuiltinExc::TypeError);

        let err = Error::type_error(gil, "dropped");
        drop(err);
        assert_eq!(class_refcnt(BuiltinExc::TypeError), before);

        Error::type_error(gil, "raised").raise(gil);
        let captured = capture(gil).unwrap();
        drop(captured);
        assert_eq!(class_refcnt(BuiltinExc::TypeError), before);

        // Raising a captured error hands its class back to the interpreter
        Error::type_error(gil, "again").raise(gil);
        capture(gil).unwrap().raise(gil);
        clear(gil);
        assert_eq!(class_refcnt(BuiltinExc::TypeError), before);
    });
}

#[test]
fn test_captured_error_reraises() {
    with_gil(|gil| {
        clear(gil);
        Error::not_implemented(gil, "later").raise(gil);
        let first = capture(gil).unwrap();
        first.raise(gil);

        let second = capture(gil).unwrap();
        assert!(second.is_instance(gil, BuiltinExc::NotImplementedError));
        assert_eq!(second.message(), "later");
    });
}

#[test]
fn test_display_and_debug() {
    with_gil(|gil| {
        clear(gil);
        let err = Error::key_error(gil, "'missing'");
        assert_eq!(err.to_string(), "KeyError: 'missing'");
        assert!(format!("{:?}", err).contains("KeyError"));

        let err: Error<'_> = "plain".into();
        assert_eq!(err.to_string(), "Exception: plain");
    });
}

#[test]
fn test_from_native_chains_sources() {
    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl std::fmt::Display for Outer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("loading failed")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "no file");
    let err = Error::from_native(&Outer(inner));
    assert_eq!(err.kind(), ExcKind::Generic);
    assert_eq!(err.message(), "loading failed: no file");
}

#[test]
fn test_status_helpers_with_pending_exception() {
    with_gil(|gil| {
        clear(gil);
        raise_key_error(gil);
        let err = int_to_err(gil, -1).unwrap_err();
        assert!(err.is_instance(gil, BuiltinExc::KeyError));
        assert!(!exception_raised(gil));

        raise_key_error(gil);
        assert!(int_to_bool_err(gil, -1).is_err());

        raise_key_error(gil);
        assert!(ssize_to_i64_err(gil, -1).is_err());
        assert!(!exception_raised(gil));
    });
}

#[test]
fn test_obj_to_obj_err() {
    with_gil(|gil| {
        clear(gil);
        let err = unsafe { obj_to_obj_err(gil, ptr::null_mut()) }.unwrap_err();
        assert_eq!(err.kind(), ExcKind::Generic);
        assert_eq!(err.message(), "NULL result without error set");

        raise_key_error(gil);
        let err = unsafe { obj_to_obj_err(gil, ptr::null_mut()) }.unwrap_err();
        assert!(err.is_instance(gil, BuiltinExc::KeyError));
        assert!(!exception_raised(gil));

        let raw = unsafe { sys::long_from_i64(41) };
        let obj = unsafe { obj_to_obj_err(gil, raw) }.unwrap();
        assert_eq!(obj.refcnt(), 1);
        assert_eq!(obj.extract_i64().unwrap(), 41);
    });
}

#[test]
fn test_capture_without_value() {
    with_gil(|gil| {
        clear(gil);
        let before = class_refcnt(BuiltinExc::TypeError);
        unsafe {
            let class = sys::exc(BuiltinExc::TypeError);
            sys::incref(class);
            sys::err_restore(class, ptr::null_mut(), ptr::null_mut());
        }

        let err = capture(gil).unwrap();
        assert_eq!(err.name(), "TypeError");
        assert_eq!(err.message(), "");
        assert!(err.is_instance(gil, BuiltinExc::TypeError));
        drop(err);
        assert_eq!(class_refcnt(BuiltinExc::TypeError), before);
    });
}

#[test]
fn test_negative_size_without_exception_is_zero() {
    with_gil(|gil| {
        clear(gil);
        assert_eq!(ssize_to_i64_err(gil, -5).unwrap(), 0);
        assert_eq!(ssize_to_i64_err(gil, isize::MIN).unwrap(), 0);
        assert!(!exception_raised(gil));
    });
}

#[test]
fn test_capture_unprintable_value() {
    with_gil(|gil| {
        clear(gil);
        let class = ClassBuilder::new("Unprintable")
            .repr(|_gil, _this| panic!("no text"))
            .register(gil)
            .unwrap();
        let value = class.instantiate(gil, None, None).unwrap();

        unsafe {
            let exc = sys::exc(BuiltinExc::KeyError);
            sys::incref(exc);
            sys::err_restore(exc, value.into_ptr(), ptr::null_mut());
        }

        let err = capture(gil).unwrap();
        assert_eq!(err.message(), "<unprintable exception>");
        assert!(err.is_instance(gil, BuiltinExc::KeyError));
        // The failure of str() itself is not left behind
        assert!(!exception_raised(gil));
    });
}

#[cfg(not(feature = "python"))]
#[test]
fn test_raise_keeps_traceback() {
    with_gil(|gil| {
        clear(gil);
        let traceback = Owned::from_str(gil, "frame 0").unwrap();
        let traceback_ptr = traceback.as_ptr();
        let value = Owned::from_str(gil, "with frames").unwrap();

        unsafe {
            let exc = sys::exc(BuiltinExc::TypeError);
            sys::incref(exc);
            sys::err_restore(exc, value.into_ptr(), traceback.into_ptr());
        }

        let err = capture(gil).unwrap();
        assert_eq!(err.traceback().map(|tb| tb.as_ptr()), Some(traceback_ptr));
        err.raise(gil);

        let (mut kind, mut value, mut tb) = (ptr::null_mut(), ptr::null_mut(), ptr::null_mut());
        unsafe { sys::err_fetch(&mut kind, &mut value, &mut tb) };
        let kind = unsafe { Owned::from_owned_ptr(gil, kind) }.unwrap();
        let value = unsafe { Owned::from_owned_ptr(gil, value) }.unwrap();
        let tb = unsafe { Owned::from_owned_ptr(gil, tb) }.unwrap();

        assert_eq!(kind.as_ptr(), unsafe { sys::exc(BuiltinExc::TypeError) });
        assert_eq!(value.str().unwrap(), "with frames");
        assert_eq!(tb.as_ptr(), traceback_ptr);
        assert_eq!(tb.refcnt(), 1);
    });
}

#[test]
fn test_raise_format_sets_base_exception() {
    with_gil(|gil| {
        clear(gil);
        raise_format(gil, format_args!("{} of {} failed", "step", 3));

        let err = capture(gil).unwrap();
        assert_eq!(err.name(), "Exception");
        assert_eq!(err.message(), "step of 3 failed");
        assert!(!err.is_instance(gil, BuiltinExc::TypeError));
    });
}

proptest! {
    #[test]
    fn prop_non_negative_status_is_ok(ret in 0i32..=i32::MAX) {
        with_gil(|gil| {
            clear(gil);
            assert!(int_to_err(gil, ret).is_ok());
            assert_eq!(int_to_bool_err(gil, ret).unwrap(), ret > 0);
            assert_eq!(ssize_to_i64_err(gil, ret as isize).unwrap(), ret as i64);
        });
    }

    #[test]
    fn prop_negative_status_without_exception_is_ok(ret in i32::MIN..0) {
        with_gil(|gil| {
            clear(gil);
            assert!(int_to_err(gil, ret).is_ok());
            assert!(!int_to_bool_err(gil, ret).unwrap());
            assert_eq!(ssize_to_i64_err(gil, ret as isize).unwrap(), 0);
        });
    }

    #[test]
    fn prop_negative_status_with_exception_is_err(ret in i32::MIN..0) {
        with_gil(|gil| {
            clear(gil);
            Error::type_error(gil, ret).raise(gil);
            let err = int_to_err(gil, ret).unwrap_err();
            assert_eq!(err.message(), ret.to_string());
            assert!(!exception_raised(gil));
        });
    }

    #[test]
    fn prop_positive_status_leaves_exception_pending(ret in 0i32..1000) {
        with_gil(|gil| {
            clear(gil);
            raise_key_error(gil);
            assert!(int_to_err(gil, ret).is_ok());
            assert!(exception_raised(gil));
            clear(gil);
        });
    }
}
