//! C entry points installed in extension type slots
//!
//! Each entry point finds the class context of its instance, runs the
//! registered closure and maps the outcome back to the slot's calling
//! convention: the result on success, the pending exception plus the
//! slot's failure value (null or -1) on error. Panics never cross the C
//! boundary.

use core::ffi::c_int;
use core::ptr::{self, NonNull};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use super::{context_of, ClassContext, Slot, SlotKind};
use crate::err::{capture, Error, PyResult, SavedException};
use crate::gil::Gil;
use crate::logging::{error, log_slot_call, log_slot_error, warn};
use crate::object::{Borrowed, CompareOp, Dict, Dying, Owned, Tuple};
use crate::sys::{self, PyObject};

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "Box<dyn Any>"
    }
}

/// A panic escaped a slot closure with panic catching disabled
fn abort_on_panic(kind: SlotKind, class: &str, message: &str) -> ! {
    error!(target: "pyslot::dispatch", slot = kind.name(), class, message, "panic in slot, aborting");
    std::process::abort()
}

/// Shared shape of every slot call except dealloc
///
/// # Safety
/// - `obj` must be null or a live instance, and the interpreter lock held
unsafe fn trampoline<'py, T, R>(
    gil: Gil<'py>,
    obj: *mut PyObject,
    kind: SlotKind,
    failure: R,
    pick: fn(&Slot) -> Option<&T>,
    body: impl FnOnce(&T, Borrowed<'_, 'py>) -> PyResult<'py, R>,
) -> R
where
    T: ?Sized + 'static,
{
    let Some(this) = Borrowed::from_ptr(gil, obj) else {
        Error::generic(format_args!("{} slot called without an instance", kind)).raise(gil);
        return failure;
    };

    let context: Option<&'static ClassContext> = context_of(obj);
    let Some(closure) = context.and_then(|ctx| ctx.find(pick)) else {
        let name = context.map_or_else(|| this.type_name(), |ctx| ctx.name().to_owned());
        Error::type_error(gil, format_args!("'{}' object has no {} slot", name, kind)).raise(gil);
        return failure;
    };
    let class = context.map_or("", ClassContext::name);

    log_slot_call(kind.name(), class);
    match catch_unwind(AssertUnwindSafe(|| body(closure, this))) {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => {
            log_slot_error(kind.name(), class, &err);
            err.raise(gil);
            failure
        }
        Err(payload) => {
            let message = panic_message(&*payload);
            if !crate::config::catch_panics() {
                abort_on_panic(kind, class, message);
            }
            let err = Error::generic(format_args!("panic in {} slot: {}", kind, message));
            log_slot_error(kind.name(), class, &err);
            err.raise(gil);
            failure
        }
    }
}

/// Arguments tuple for a slot, substituting an empty tuple for null
unsafe fn args_view<'a, 'py>(
    gil: Gil<'py>,
    args: *mut PyObject,
    holder: &'a mut Option<Owned<'py>>,
) -> PyResult<'py, Tuple<'a, 'py>> {
    if args.is_null() {
        let empty = holder.insert(Owned::tuple(gil, std::iter::empty())?);
        return Ok(Tuple::from_ptr_unchecked(gil, empty.as_ptr()));
    }
    Ok(Tuple::from_ptr_unchecked(gil, args))
}

unsafe fn kwds_view<'a, 'py>(gil: Gil<'py>, kwds: *mut PyObject) -> Option<Dict<'a, 'py>> {
    (!kwds.is_null()).then(|| Dict::from_ptr_unchecked(gil, kwds))
}

unsafe fn other_view<'a, 'py>(gil: Gil<'py>, other: *mut PyObject) -> PyResult<'py, Borrowed<'a, 'py>> {
    Borrowed::from_ptr(gil, other).ok_or_else(|| Error::generic("comparison with a NULL object"))
}

/// Text returned by repr/str closures, as a new string object
fn text_result<'py>(gil: Gil<'py>, text: String) -> PyResult<'py, *mut PyObject> {
    Owned::from_str(gil, &text).map(Owned::into_ptr)
}

pub(crate) unsafe extern "C" fn class_call(
    obj: *mut PyObject,
    args: *mut PyObject,
    kwds: *mut PyObject,
) -> *mut PyObject {
    let gil = Gil::assume();
    trampoline(gil, obj, SlotKind::Call, ptr::null_mut(), Slot::as_call, |f, this| {
        let mut holder = None;
        let args = args_view(gil, args, &mut holder)?;
        let result = f(gil, this, args, kwds_view(gil, kwds))?;
        Ok(result.into_ptr())
    })
}

pub(crate) unsafe extern "C" fn class_compare(obj: *mut PyObject, other: *mut PyObject) -> c_int {
    let gil = Gil::assume();
    trampoline(gil, obj, SlotKind::Compare, -1, Slot::as_compare, |f, this| {
        let other = other_view(gil, other)?;
        f(gil, this, other)
    })
}

pub(crate) unsafe extern "C" fn class_init(
    obj: *mut PyObject,
    args: *mut PyObject,
    kwds: *mut PyObject,
) -> c_int {
    let gil = Gil::assume();
    trampoline(gil, obj, SlotKind::Init, -1, Slot::as_init, |f, this| {
        let mut holder = None;
        let args = args_view(gil, args, &mut holder)?;
        f(gil, this, args, kwds_view(gil, kwds))?;
        Ok(0)
    })
}

pub(crate) unsafe extern "C" fn class_repr(obj: *mut PyObject) -> *mut PyObject {
    let gil = Gil::assume();
    trampoline(gil, obj, SlotKind::Repr, ptr::null_mut(), Slot::as_repr, |f, this| {
        text_result(gil, f(gil, this))
    })
}

pub(crate) unsafe extern "C" fn class_str(obj: *mut PyObject) -> *mut PyObject {
    let gil = Gil::assume();
    trampoline(gil, obj, SlotKind::Str, ptr::null_mut(), Slot::as_str, |f, this| {
        text_result(gil, f(gil, this))
    })
}

pub(crate) unsafe extern "C" fn class_richcompare(
    obj: *mut PyObject,
    other: *mut PyObject,
    op: c_int,
) -> *mut PyObject {
    let gil = Gil::assume();
    trampoline(gil, obj, SlotKind::RichCompare, ptr::null_mut(), Slot::as_richcompare, |f, this| {
        let op = CompareOp::from_raw(op)
            .ok_or_else(|| Error::generic(format_args!("invalid rich comparison operator {}", op)))?;
        let other = other_view(gil, other)?;
        Ok(f(gil, this, other, op)?.into_ptr())
    })
}

/// Dealloc never fails: exception state is the same before and after
pub(crate) unsafe extern "C" fn class_dealloc(obj: *mut PyObject) {
    let gil = Gil::assume();
    let Some(ptr) = NonNull::new(obj) else {
        return;
    };

    let context = context_of(obj);
    let Some(closure) = context.and_then(|ctx| ctx.find(Slot::as_dealloc)) else {
        sys::generic_free(obj);
        return;
    };
    let class = context.map_or("", ClassContext::name);

    log_slot_call(SlotKind::Dealloc.name(), class);
    let saved = SavedException::fetch(gil);

    let outcome = catch_unwind(AssertUnwindSafe(|| closure(gil, Dying::new(gil, ptr))));
    if let Err(payload) = outcome {
        let message = panic_message(&*payload);
        if !crate::config::catch_panics() {
            abort_on_panic(SlotKind::Dealloc, class, message);
        }
        error!(target: "pyslot::dispatch", class, message, "panic in dealloc slot");
    }
    if let Some(leftover) = capture(gil) {
        warn!(target: "pyslot::dispatch", class, error = %leftover, "exception discarded in dealloc");
    }

    saved.restore(gil);
}
