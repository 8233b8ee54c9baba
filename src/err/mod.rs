//! Error translation between the interpreter's exception state and Rust
//!
//! Design: a pending interpreter exception becomes an `Error` value when
//! captured, and an `Error` becomes the pending exception when raised:
//! 1. `capture` fetches and clears the pending exception, taking over its
//!    class and traceback references
//! 2. `Error::raise` consumes the error; the interpreter takes its own
//!    reference to the class and ours is released
//! 3. Dropping an error that is never raised releases its class reference
//!
//! Typed constructors hold a reference to the matching builtin class.

mod convert;

pub use convert::{int_to_bool_err, int_to_err, obj_to_obj_err, ssize_to_i64_err};

use std::borrow::Cow;
use std::fmt;
use std::ptr;

use crate::gil::Gil;
use crate::logging::{log_capture, log_raise};
use crate::object::{to_cstring, Borrowed, Owned};
use crate::sys::{self, BuiltinExc, PyObject};

/// Result of an operation that may leave an interpreter exception
pub type PyResult<'py, T> = Result<T, Error<'py>>;

/// Where an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExcKind {
    TypeError,
    KeyError,
    AttributeError,
    NotImplementedError,
    /// No class attached; raised as the base `Exception`
    Generic,
    /// Taken from the interpreter's pending exception
    Captured,
}

/// An interpreter exception held as a Rust value
pub struct Error<'py> {
    kind: ExcKind,
    class: Option<Owned<'py>>,
    traceback: Option<Owned<'py>>,
    msg: String,
    name: Cow<'static, str>,
}

impl<'py> Error<'py> {
    fn typed(gil: Gil<'py>, kind: ExcKind, exc: BuiltinExc, msg: impl fmt::Display) -> Self {
        let class = unsafe { Owned::from_borrowed_ptr(gil, sys::exc(exc)) };
        Error {
            kind,
            class,
            traceback: None,
            msg: msg.to_string(),
            name: Cow::Borrowed(exc.name()),
        }
    }

    /// `TypeError` with the given message
    pub fn type_error(gil: Gil<'py>, msg: impl fmt::Display) -> Self {
        Self::typed(gil, ExcKind::TypeError, BuiltinExc::TypeError, msg)
    }

    /// `KeyError` with the given message
    pub fn key_error(gil: Gil<'py>, msg: impl fmt::Display) -> Self {
        Self::typed(gil, ExcKind::KeyError, BuiltinExc::KeyError, msg)
    }

    /// `AttributeError` with the given message
    pub fn attribute_error(gil: Gil<'py>, msg: impl fmt::Display) -> Self {
        Self::typed(gil, ExcKind::AttributeError, BuiltinExc::AttributeError, msg)
    }

    /// `NotImplementedError` with the given message
    pub fn not_implemented(gil: Gil<'py>, msg: impl fmt::Display) -> Self {
        Self::typed(gil, ExcKind::NotImplementedError, BuiltinExc::NotImplementedError, msg)
    }

    /// An error with no class; raised as the base `Exception`
    pub fn generic(msg: impl fmt::Display) -> Self {
        Error {
            kind: ExcKind::Generic,
            class: None,
            traceback: None,
            msg: msg.to_string(),
            name: Cow::Borrowed(BuiltinExc::Exception.name()),
        }
    }

    /// A generic error carrying a Rust error's message chain
    pub fn from_native(err: &dyn std::error::Error) -> Self {
        let mut msg = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            msg.push_str(": ");
            msg.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::generic(msg)
    }

    pub fn kind(&self) -> ExcKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Class name used in `Display`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The exception class, if one is attached
    pub fn class(&self) -> Option<Borrowed<'_, 'py>> {
        self.class.as_ref().map(Owned::as_borrowed)
    }

    pub fn traceback(&self) -> Option<Borrowed<'_, 'py>> {
        self.traceback.as_ref().map(Owned::as_borrowed)
    }

    fn class_ptr(&self) -> *mut PyObject {
        match &self.class {
            Some(class) => class.as_ptr(),
            None => unsafe { sys::exc(BuiltinExc::Exception) },
        }
    }

    /// Whether this error's class is `exc` or a subclass of it
    ///
    /// Errors without a class count as the base `Exception`.
    pub fn is_instance(&self, _gil: Gil<'py>, exc: BuiltinExc) -> bool {
        unsafe { sys::is_subclass(self.class_ptr(), sys::exc(exc)) > 0 }
    }

    /// Make this error the interpreter's pending exception
    ///
    /// Replaces any exception already pending.
    pub fn raise(mut self, gil: Gil<'py>) {
        log_raise(&self.name, &self.msg, self.class.is_some());
        let class = self.class_ptr();

        if let Some(traceback) = self.traceback.take() {
            if let Ok(value) = Owned::from_str(gil, &self.msg) {
                unsafe {
                    sys::incref(class);
                    sys::err_restore(class, value.into_ptr(), traceback.into_ptr());
                }
                return;
            }
        }

        let msg = to_cstring(&self.msg);
        unsafe { sys::err_set_string(class, msg.as_ptr()) };
    }
}

impl fmt::Display for Error<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.msg)
    }
}

impl fmt::Debug for Error<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("msg", &self.msg)
            .field("traceback", &self.traceback.is_some())
            .finish()
    }
}

impl std::error::Error for Error<'_> {}

impl From<&str> for Error<'_> {
    fn from(msg: &str) -> Self {
        Error::generic(msg)
    }
}

impl From<String> for Error<'_> {
    fn from(msg: String) -> Self {
        Error::generic(msg)
    }
}

/// Whether an exception is pending
pub fn exception_raised(_gil: Gil<'_>) -> bool {
    unsafe { !sys::err_occurred().is_null() }
}

/// Fetch and clear the pending exception
///
/// Returns `None`, leaving the state untouched, when nothing is pending.
pub fn capture(gil: Gil<'_>) -> Option<Error<'_>> {
    if !exception_raised(gil) {
        return None;
    }

    let (mut kind, mut value, mut traceback) = (ptr::null_mut(), ptr::null_mut(), ptr::null_mut());
    unsafe { sys::err_fetch(&mut kind, &mut value, &mut traceback) };

    let class = unsafe { Owned::from_owned_ptr(gil, kind) };
    let traceback = unsafe { Owned::from_owned_ptr(gil, traceback) };

    // The stringified value is dropped before returning
    let msg = match unsafe { Owned::from_owned_ptr(gil, value) } {
        None => String::new(),
        Some(value) => value
            .str()
            .unwrap_or_else(|_| "<unprintable exception>".to_owned()),
    };

    let name = match &class {
        Some(class) => Cow::Owned(unsafe { sys::type_name(class.as_ptr() as *mut sys::PyTypeObject) }),
        None => Cow::Borrowed(BuiltinExc::Exception.name()),
    };

    log_capture(&name, &msg);
    Some(Error {
        kind: ExcKind::Captured,
        class,
        traceback,
        msg,
        name,
    })
}

/// Format `msg` and make it the pending exception as a base `Exception`
///
/// Shorthand for `Error::generic(msg).raise(gil)`.
pub fn raise_format(gil: Gil<'_>, msg: impl fmt::Display) {
    Error::generic(msg).raise(gil);
}

/// Discard the pending exception, if any
pub fn clear(_gil: Gil<'_>) {
    unsafe { sys::err_clear() }
}

/// The raw pending-exception triple, parked while a destructor runs
pub(crate) struct SavedException {
    kind: *mut PyObject,
    value: *mut PyObject,
    traceback: *mut PyObject,
}

impl SavedException {
    pub(crate) fn fetch(_gil: Gil<'_>) -> Self {
        let mut saved = SavedException {
            kind: ptr::null_mut(),
            value: ptr::null_mut(),
            traceback: ptr::null_mut(),
        };
        unsafe { sys::err_fetch(&mut saved.kind, &mut saved.value, &mut saved.traceback) };
        saved
    }

    /// Put the parked exception back (clearing the state if there was none)
    pub(crate) fn restore(self, _gil: Gil<'_>) {
        unsafe { sys::err_restore(self.kind, self.value, self.traceback) }
    }
}
