//! Slot dispatch through the bundled runtime

#![cfg(not(feature = "python"))]

use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pyslot::sys::{self, PyObject};
use pyslot::{
    capture, clear, exception_raised, with_gil, BuiltinExc, ClassBuilder, CompareOp, Error, Gil,
    Owned,
};

#[repr(C)]
struct Counter {
    ob_base: PyObject,
    value: i64,
}

fn value_of(obj: *mut PyObject) -> i64 {
    unsafe { (*(obj as *mut Counter)).value }
}

fn set_value(obj: *mut PyObject, value: i64) {
    unsafe { (*(obj as *mut Counter)).value = value }
}

fn counter_builder(name: &str) -> ClassBuilder {
    ClassBuilder::new(name)
        .basicsize(std::mem::size_of::<Counter>())
        .init(|gil, this, args, kwds| {
            let start = match args.iter().next() {
                Some(arg) => arg.extract_i64()?,
                None => 0,
            };
            let step = match kwds.and_then(|k| k.get("step")) {
                Some(step) => step.extract_i64()?,
                None => 1,
            };
            if step == 0 {
                return Err(Error::type_error(gil, "step must be non-zero"));
            }
            set_value(this.as_ptr(), start * step);
            Ok(())
        })
}

fn new_counter<'py>(gil: Gil<'py>, class: &pyslot::Class, value: i64) -> Owned<'py> {
    let obj = class.instantiate(gil, None, None).unwrap();
    set_value(obj.as_ptr(), value);
    obj
}

#[test]
fn test_call_slot_success() {
    let class = with_gil(|gil| {
        clear(gil);
        counter_builder("Adder")
            .call(|gil, this, args, _kwds| {
                let mut total = value_of(this.as_ptr());
                for arg in args {
                    total += arg.extract_i64()?;
                }
                Owned::from_i64(gil, total)
            })
            .register(gil)
            .unwrap()
    });

    with_gil(|gil| {
        let adder = new_counter(gil, &class, 10);
        let args = Owned::tuple(
            gil,
            [Owned::from_i64(gil, 1).unwrap(), Owned::from_i64(gil, 2).unwrap()],
        )
        .unwrap();

        let result = adder.call(Some(args.as_borrowed().as_tuple().unwrap()), None).unwrap();
        assert_eq!(result.extract_i64().unwrap(), 13);
        assert_eq!(result.refcnt(), 1);
        assert!(!exception_raised(gil));
    });
}

#[test]
fn test_call_slot_error_raises_and_returns_null() {
    with_gil(|gil| {
        clear(gil);
        let class = ClassBuilder::new("Grumpy")
            .call(|gil, _this, _args, _kwds| Err(Error::key_error(gil, "no such thing")))
            .register(gil)
            .unwrap();
        let obj = class.instantiate(gil, None, None).unwrap();

        let raw = unsafe { sys::object_call(obj.as_ptr(), ptr::null_mut(), ptr::null_mut()) };
        assert!(raw.is_null());
        let err = capture(gil).unwrap();
        assert!(err.is_instance(gil, BuiltinExc::KeyError));
        assert_eq!(err.message(), "no such thing");
    });
}

#[test]
fn test_call_slot_with_null_args_and_kwds() {
    with_gil(|gil| {
        clear(gil);
        let seen = Arc::new(AtomicUsize::new(usize::MAX));
        let seen_in_slot = Arc::clone(&seen);
        let class = ClassBuilder::new("ArgCounter")
            .call(move |gil, _this, args, kwds| {
                assert!(kwds.is_none());
                seen_in_slot.store(args.len()? as usize, Ordering::SeqCst);
                Ok(Owned::none(gil))
            })
            .register(gil)
            .unwrap();
        let obj = class.instantiate(gil, None, None).unwrap();

        let call = unsafe { (*class.as_type_ptr()).tp_slots.call.unwrap() };
        let result = unsafe { call(obj.as_ptr(), ptr::null_mut(), ptr::null_mut()) };
        assert_eq!(result, unsafe { sys::none() });
        unsafe { sys::decref(result) };
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    });
}

#[test]
fn test_init_slot_reads_args_and_kwds() {
    with_gil(|gil| {
        clear(gil);
        let class = counter_builder("Scaled").register(gil).unwrap();

        let args = Owned::tuple(gil, [Owned::from_i64(gil, 4).unwrap()]).unwrap();
        let step = Owned::from_i64(gil, 3).unwrap();
        let kwds = Owned::dict(gil, [("step", step.as_borrowed())]).unwrap();

        let obj = class
            .instantiate(
                gil,
                Some(args.as_borrowed().as_tuple().unwrap()),
                Some(kwds.as_borrowed().as_dict().unwrap()),
            )
            .unwrap();
        assert_eq!(value_of(obj.as_ptr()), 12);
        assert!(class.is_instance(obj.as_borrowed()));
    });
}

#[test]
fn test_init_slot_error_propagates() {
    with_gil(|gil| {
        clear(gil);
        let deallocs = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&deallocs);
        let class = counter_builder("Strict")
            .dealloc(move |_gil, _dying| {
                counted.fetch_add(1, Ordering::SeqCst);
            })
            .register(gil)
            .unwrap();

        let step = Owned::from_i64(gil, 0).unwrap();
        let kwds = Owned::dict(gil, [("step", step.as_borrowed())]).unwrap();
        let err = class
            .instantiate(gil, None, Some(kwds.as_borrowed().as_dict().unwrap()))
            .unwrap_err();

        assert!(err.is_instance(gil, BuiltinExc::TypeError));
        assert_eq!(err.message(), "step must be non-zero");
        assert!(!exception_raised(gil));
        // The half-built instance was released
        assert_eq!(deallocs.load(Ordering::SeqCst), 1);
    });
}

#[test]
fn test_compare_slot() {
    with_gil(|gil| {
        clear(gil);
        let class = ClassBuilder::new("Ranked")
            .basicsize(std::mem::size_of::<Counter>())
            .compare(|gil, this, other| {
                if value_of(other.as_ptr()) < 0 {
                    return Err(Error::attribute_error(gil, "negative rank"));
                }
                Ok(value_of(this.as_ptr()).cmp(&value_of(other.as_ptr())) as i32)
            })
            .register(gil)
            .unwrap();

        let low = new_counter(gil, &class, 1);
        let high = new_counter(gil, &class, 9);
        let broken = new_counter(gil, &class, -5);

        assert_eq!(low.compare(high.as_borrowed()).unwrap(), std::cmp::Ordering::Less);
        assert_eq!(high.compare(low.as_borrowed()).unwrap(), std::cmp::Ordering::Greater);

        let rc = unsafe { sys::object_compare(low.as_ptr(), broken.as_ptr()) };
        assert_eq!(rc, -1);
        let err = capture(gil).unwrap();
        assert!(err.is_instance(gil, BuiltinExc::AttributeError));
        assert_eq!(err.message(), "negative rank");
    });
}

#[test]
fn test_richcompare_slot() {
    with_gil(|gil| {
        clear(gil);
        let class = ClassBuilder::new("Version")
            .basicsize(std::mem::size_of::<Counter>())
            .richcompare(|gil, this, other, op| {
                if op == CompareOp::Ne {
                    return Err(Error::not_implemented(gil, format_args!("{} is unsupported", op)));
                }
                let ord = value_of(this.as_ptr()).cmp(&value_of(other.as_ptr()));
                Ok(Owned::from_bool(gil, op.matches(ord)))
            })
            .register(gil)
            .unwrap();

        let a = new_counter(gil, &class, 2);
        let b = new_counter(gil, &class, 3);

        let lt = a.rich_compare(b.as_borrowed(), CompareOp::Lt).unwrap();
        assert!(lt.is_true().unwrap());
        let ge = a.rich_compare(b.as_borrowed(), CompareOp::Ge).unwrap();
        assert!(!ge.is_true().unwrap());

        let err = a.rich_compare(b.as_borrowed(), CompareOp::Ne).unwrap_err();
        assert!(err.is_instance(gil, BuiltinExc::NotImplementedError));
        assert_eq!(err.message(), "!= is unsupported");
    });
}

#[test]
fn test_richcompare_invalid_operator() {
    with_gil(|gil| {
        clear(gil);
        let class = ClassBuilder::new("AnyCmp")
            .richcompare(|gil, _this, _other, _op| Ok(Owned::from_bool(gil, true)))
            .register(gil)
            .unwrap();
        let obj = class.instantiate(gil, None, None).unwrap();

        let richcompare = unsafe { (*class.as_type_ptr()).tp_slots.richcompare.unwrap() };
        let result = unsafe { richcompare(obj.as_ptr(), obj.as_ptr(), 42) };
        assert!(result.is_null());

        let err = capture(gil).unwrap();
        assert!(err.is_instance(gil, BuiltinExc::Exception));
        assert!(!err.is_instance(gil, BuiltinExc::TypeError));
        assert!(err.message().contains("42"));
    });
}

#[test]
fn test_repr_and_str_slots() {
    with_gil(|gil| {
        clear(gil);
        let class = ClassBuilder::new("Label")
            .basicsize(std::mem::size_of::<Counter>())
            .repr(|_gil, this| format!("Label({})", value_of(this.as_ptr())))
            .str(|_gil, this| format!("label #{}\0hidden", value_of(this.as_ptr())))
            .register(gil)
            .unwrap();

        let obj = new_counter(gil, &class, 7);
        assert_eq!(obj.repr().unwrap(), "Label(7)");
        assert_eq!(obj.str().unwrap(), "label #7");
    });
}

#[test]
fn test_panic_in_slot_becomes_exception() {
    with_gil(|gil| {
        clear(gil);
        let class = ClassBuilder::new("Fragile")
            .repr(|_gil, _this| panic!("boom"))
            .register(gil)
            .unwrap();
        let obj = class.instantiate(gil, None, None).unwrap();

        let err = obj.repr().unwrap_err();
        assert!(err.is_instance(gil, BuiltinExc::Exception));
        assert_eq!(err.message(), "panic in repr slot: boom");
        assert!(!exception_raised(gil));
    });
}

#[test]
fn test_missing_context_raises_type_error() {
    with_gil(|gil| {
        clear(gil);
        let class = ClassBuilder::new("Callable")
            .call(|gil, _this, _args, _kwds| Ok(Owned::none(gil)))
            .register(gil)
            .unwrap();

        // The entry point reached through an object of an unrelated type
        let call = unsafe { (*class.as_type_ptr()).tp_slots.call.unwrap() };
        let stranger = Owned::from_i64(gil, 3).unwrap();
        let result = unsafe { call(stranger.as_ptr(), ptr::null_mut(), ptr::null_mut()) };
        assert!(result.is_null());

        let err = capture(gil).unwrap();
        assert!(err.is_instance(gil, BuiltinExc::TypeError));
        assert_eq!(err.message(), "'int' object has no call slot");
    });
}

#[test]
fn test_dealloc_runs_once_and_preserves_exception() {
    with_gil(|gil| {
        clear(gil);
        let runs = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&runs);
        let class = ClassBuilder::new("Tracked")
            .basicsize(std::mem::size_of::<Counter>())
            .dealloc(move |gil, dying| {
                counted.fetch_add(1, Ordering::SeqCst);
                assert_eq!(dying.type_name(), "Tracked");
                // Leaves an exception behind; it must not escape
                Error::type_error(gil, "from dealloc").raise(gil);
            })
            .register(gil)
            .unwrap();

        let obj = new_counter(gil, &class, 1);
        Error::key_error(gil, "pending").raise(gil);
        drop(obj);

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        let err = capture(gil).unwrap();
        assert!(err.is_instance(gil, BuiltinExc::KeyError));
        assert_eq!(err.message(), "pending");
    });
}

#[test]
fn test_dealloc_without_closure_frees() {
    with_gil(|gil| {
        clear(gil);
        let class = ClassBuilder::new("Plain").register(gil).unwrap();
        let obj = class.instantiate(gil, None, None).unwrap();
        assert_eq!(obj.refcnt(), 1);
        drop(obj);
        assert!(!exception_raised(gil));
    });
}

#[test]
fn test_register_rejects_bad_definitions() {
    with_gil(|gil| {
        clear(gil);
        let err = ClassBuilder::new("Bad\0Name").register(gil).unwrap_err();
        assert!(err.is_instance(gil, BuiltinExc::TypeError));

        let err = ClassBuilder::new("Tiny").basicsize(1).register(gil).unwrap_err();
        assert!(err.is_instance(gil, BuiltinExc::TypeError));
        assert!(!exception_raised(gil));
    });
}

#[test]
fn test_context_lookup() {
    with_gil(|gil| {
        clear(gil);
        let class = ClassBuilder::new("Described")
            .repr(|_gil, _this| "d".to_string())
            .str(|_gil, _this| "d".to_string())
            .register(gil)
            .unwrap();

        let context = class.context();
        assert_eq!(context.name(), "Described");
        assert!(context.has_slot(pyslot::SlotKind::Repr));
        assert!(!context.has_slot(pyslot::SlotKind::Call));
        assert_eq!(class.name(), "Described");
    });
}
