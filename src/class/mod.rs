//! Extension classes - Rust closures behind interpreter type slots
//!
//! Design: a class is registered once from a `ClassBuilder`:
//! 1. Each slot closure is stored pre-typed in a `Slot` variant
//! 2. The closures live in a `ClassContext` leaked to `'static`, since
//!    instances may reach the slots for the rest of the process
//! 3. The context is found from an instance through its type pointer
//! 4. The type object's slots point at the C entry points in `dispatch`

mod dispatch;

use core::ptr::NonNull;
use std::ffi::CString;
use std::fmt;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use smallvec::SmallVec;

use crate::err::{obj_to_obj_err, Error, PyResult};
use crate::gil::Gil;
use crate::logging::info;
use crate::object::{Borrowed, CompareOp, Dict, Dying, Owned, Tuple};
use crate::sys::{self, PyObject, PyTypeObject, SlotTable};

pub type CallFn = dyn for<'a, 'py> Fn(Gil<'py>, Borrowed<'a, 'py>, Tuple<'a, 'py>, Option<Dict<'a, 'py>>) -> PyResult<'py, Owned<'py>>
    + Send
    + Sync;
pub type CompareFn =
    dyn for<'a, 'py> Fn(Gil<'py>, Borrowed<'a, 'py>, Borrowed<'a, 'py>) -> PyResult<'py, i32> + Send + Sync;
pub type DeallocFn = dyn for<'py> Fn(Gil<'py>, Dying<'py>) + Send + Sync;
pub type InitFn = dyn for<'a, 'py> Fn(Gil<'py>, Borrowed<'a, 'py>, Tuple<'a, 'py>, Option<Dict<'a, 'py>>) -> PyResult<'py, ()>
    + Send
    + Sync;
pub type ReprFn = dyn for<'a, 'py> Fn(Gil<'py>, Borrowed<'a, 'py>) -> String + Send + Sync;
pub type RichCompareFn = dyn for<'a, 'py> Fn(Gil<'py>, Borrowed<'a, 'py>, Borrowed<'a, 'py>, CompareOp) -> PyResult<'py, Owned<'py>>
    + Send
    + Sync;

/// One registered slot closure
pub enum Slot {
    Call(Box<CallFn>),
    Compare(Box<CompareFn>),
    Dealloc(Box<DeallocFn>),
    Init(Box<InitFn>),
    Repr(Box<ReprFn>),
    Str(Box<ReprFn>),
    RichCompare(Box<RichCompareFn>),
}

/// Slot names, as used in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Call,
    Compare,
    Dealloc,
    Init,
    Repr,
    Str,
    RichCompare,
}

impl SlotKind {
    pub fn name(self) -> &'static str {
        match self {
            SlotKind::Call => "call",
            SlotKind::Compare => "compare",
            SlotKind::Dealloc => "dealloc",
            SlotKind::Init => "init",
            SlotKind::Repr => "repr",
            SlotKind::Str => "str",
            SlotKind::RichCompare => "richcompare",
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Slot {
    pub fn kind(&self) -> SlotKind {
        match self {
            Slot::Call(_) => SlotKind::Call,
            Slot::Compare(_) => SlotKind::Compare,
            Slot::Dealloc(_) => SlotKind::Dealloc,
            Slot::Init(_) => SlotKind::Init,
            Slot::Repr(_) => SlotKind::Repr,
            Slot::Str(_) => SlotKind::Str,
            Slot::RichCompare(_) => SlotKind::RichCompare,
        }
    }

    pub(crate) fn as_call(&self) -> Option<&CallFn> {
        match self {
            Slot::Call(f) => Some(&**f),
            _ => None,
        }
    }

    pub(crate) fn as_compare(&self) -> Option<&CompareFn> {
        match self {
            Slot::Compare(f) => Some(&**f),
            _ => None,
        }
    }

    pub(crate) fn as_dealloc(&self) -> Option<&DeallocFn> {
        match self {
            Slot::Dealloc(f) => Some(&**f),
            _ => None,
        }
    }

    pub(crate) fn as_init(&self) -> Option<&InitFn> {
        match self {
            Slot::Init(f) => Some(&**f),
            _ => None,
        }
    }

    pub(crate) fn as_repr(&self) -> Option<&ReprFn> {
        match self {
            Slot::Repr(f) => Some(&**f),
            _ => None,
        }
    }

    pub(crate) fn as_str(&self) -> Option<&ReprFn> {
        match self {
            Slot::Str(f) => Some(&**f),
            _ => None,
        }
    }

    pub(crate) fn as_richcompare(&self) -> Option<&RichCompareFn> {
        match self {
            Slot::RichCompare(f) => Some(&**f),
            _ => None,
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot::{:?}", self.kind())
    }
}

/// The slot closures of one extension class, shared by all its instances
#[derive(Debug)]
pub struct ClassContext {
    name: String,
    slots: SmallVec<[Slot; 7]>,
}

impl ClassContext {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_slot(&self, kind: SlotKind) -> bool {
        self.slots.iter().any(|slot| slot.kind() == kind)
    }

    /// First slot the selector accepts
    pub(crate) fn find<T: ?Sized>(&self, pick: impl Fn(&Slot) -> Option<&T>) -> Option<&T> {
        self.slots.iter().find_map(pick)
    }
}

/// Type address -> context, filled at registration
static CONTEXTS: Lazy<DashMap<usize, &'static ClassContext>> = Lazy::new(DashMap::new);

/// Context of the class `tp` was registered as
pub(crate) fn context_for(tp: *mut PyTypeObject) -> Option<&'static ClassContext> {
    CONTEXTS.get(&(tp as usize)).map(|entry| *entry.value())
}

/// Context of the class an instance belongs to
///
/// # Safety
/// - `obj` must be a valid object
pub(crate) unsafe fn context_of(obj: *mut PyObject) -> Option<&'static ClassContext> {
    context_for(sys::type_of(obj))
}

/// Builder for an extension class
pub struct ClassBuilder {
    name: String,
    basicsize: usize,
    slots: SmallVec<[Slot; 7]>,
}

impl ClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            basicsize: core::mem::size_of::<PyObject>(),
            slots: SmallVec::new(),
        }
    }

    /// Instance size in bytes, header included
    ///
    /// Instances are zeroed past the header; closures reach the extra
    /// bytes through `Borrowed::as_ptr`.
    pub fn basicsize(mut self, size: usize) -> Self {
        self.basicsize = size;
        self
    }

    fn with_slot(mut self, slot: Slot) -> Self {
        let kind = slot.kind();
        self.slots.retain(|existing| existing.kind() != kind);
        self.slots.push(slot);
        self
    }

    pub fn call<F>(self, f: F) -> Self
    where
        F: for<'a, 'py> Fn(Gil<'py>, Borrowed<'a, 'py>, Tuple<'a, 'py>, Option<Dict<'a, 'py>>) -> PyResult<'py, Owned<'py>>
            + Send
            + Sync
            + 'static,
    {
        self.with_slot(Slot::Call(Box::new(f)))
    }

    pub fn compare<F>(self, f: F) -> Self
    where
        F: for<'a, 'py> Fn(Gil<'py>, Borrowed<'a, 'py>, Borrowed<'a, 'py>) -> PyResult<'py, i32>
            + Send
            + Sync
            + 'static,
    {
        self.with_slot(Slot::Compare(Box::new(f)))
    }

    pub fn dealloc<F>(self, f: F) -> Self
    where
        F: for<'py> Fn(Gil<'py>, Dying<'py>) + Send + Sync + 'static,
    {
        self.with_slot(Slot::Dealloc(Box::new(f)))
    }

    pub fn init<F>(self, f: F) -> Self
    where
        F: for<'a, 'py> Fn(Gil<'py>, Borrowed<'a, 'py>, Tuple<'a, 'py>, Option<Dict<'a, 'py>>) -> PyResult<'py, ()>
            + Send
            + Sync
            + 'static,
    {
        self.with_slot(Slot::Init(Box::new(f)))
    }

    pub fn repr<F>(self, f: F) -> Self
    where
        F: for<'a, 'py> Fn(Gil<'py>, Borrowed<'a, 'py>) -> String + Send + Sync + 'static,
    {
        self.with_slot(Slot::Repr(Box::new(f)))
    }

    pub fn str<F>(self, f: F) -> Self
    where
        F: for<'a, 'py> Fn(Gil<'py>, Borrowed<'a, 'py>) -> String + Send + Sync + 'static,
    {
        self.with_slot(Slot::Str(Box::new(f)))
    }

    pub fn richcompare<F>(self, f: F) -> Self
    where
        F: for<'a, 'py> Fn(Gil<'py>, Borrowed<'a, 'py>, Borrowed<'a, 'py>, CompareOp) -> PyResult<'py, Owned<'py>>
            + Send
            + Sync
            + 'static,
    {
        self.with_slot(Slot::RichCompare(Box::new(f)))
    }

    /// Create the type object and make its slots dispatch to the closures
    pub fn register<'py>(self, gil: Gil<'py>) -> PyResult<'py, Class> {
        let Ok(c_name) = CString::new(self.name.as_str()) else {
            return Err(Error::type_error(
                gil,
                format_args!("class name {:?} contains a NUL byte", self.name),
            ));
        };
        if self.basicsize < core::mem::size_of::<PyObject>() {
            return Err(Error::type_error(
                gil,
                format_args!(
                    "basicsize {} of class '{}' cannot hold an object header",
                    self.basicsize, self.name
                ),
            ));
        }

        let context = ClassContext {
            name: self.name,
            slots: self.slots,
        };
        if context.has_slot(SlotKind::Compare) && !sys::SUPPORTS_COMPARE {
            return Err(Error::type_error(
                gil,
                format_args!("class '{}': the interpreter has no compare slot", context.name),
            ));
        }

        let has = |kind| context.has_slot(kind);
        let table = SlotTable {
            dealloc: Some(dispatch::class_dealloc),
            call: has(SlotKind::Call).then_some(dispatch::class_call as sys::TernaryFunc),
            compare: has(SlotKind::Compare).then_some(dispatch::class_compare as sys::CmpFunc),
            init: has(SlotKind::Init).then_some(dispatch::class_init as sys::InitProc),
            repr: has(SlotKind::Repr).then_some(dispatch::class_repr as sys::ReprFunc),
            str: has(SlotKind::Str).then_some(dispatch::class_str as sys::ReprFunc),
            richcompare: has(SlotKind::RichCompare)
                .then_some(dispatch::class_richcompare as sys::RichCmpFunc),
        };

        // Types are never freed, so neither is the name they point at
        let c_name: &'static std::ffi::CStr = Box::leak(c_name.into_boxed_c_str());
        let tp = unsafe { sys::type_new(c_name, self.basicsize, &table) };
        let Some(tp) = NonNull::new(tp) else {
            return Err(crate::object::capture_or_generic(gil, "type creation failed"));
        };

        let context: &'static ClassContext = Box::leak(Box::new(context));
        CONTEXTS.insert(tp.as_ptr() as usize, context);
        info!(
            class = context.name(),
            slots = context.slots.len(),
            basicsize = self.basicsize,
            "class registered"
        );

        Ok(Class { tp, context })
    }
}

/// A registered extension class
#[derive(Clone, Copy)]
pub struct Class {
    tp: NonNull<PyTypeObject>,
    context: &'static ClassContext,
}

// Type objects of registered classes live for the rest of the process
unsafe impl Send for Class {}
unsafe impl Sync for Class {}

impl Class {
    pub fn name(&self) -> &'static str {
        self.context.name()
    }

    pub fn context(&self) -> &'static ClassContext {
        self.context
    }

    pub fn as_type_ptr(&self) -> *mut PyTypeObject {
        self.tp.as_ptr()
    }

    /// The type object as an interpreter value
    pub fn as_object<'py>(&self, gil: Gil<'py>) -> Borrowed<'static, 'py> {
        Borrowed::from_nonnull(gil, self.tp.cast())
    }

    /// A zeroed instance that skipped the init slot
    pub fn alloc<'py>(&self, gil: Gil<'py>) -> PyResult<'py, Owned<'py>> {
        unsafe { obj_to_obj_err(gil, sys::type_alloc(self.tp.as_ptr())) }
    }

    /// Instantiate the class the way calling it from the interpreter does
    pub fn instantiate<'py>(
        &self,
        gil: Gil<'py>,
        args: Option<Tuple<'_, 'py>>,
        kwds: Option<Dict<'_, 'py>>,
    ) -> PyResult<'py, Owned<'py>> {
        let args = args.map_or(core::ptr::null_mut(), |t| t.as_ptr());
        let kwds = kwds.map_or(core::ptr::null_mut(), |d| d.as_ptr());
        unsafe { obj_to_obj_err(gil, sys::type_call(self.tp.as_ptr(), args, kwds)) }
    }

    /// Whether `obj` is an instance of exactly this class
    pub fn is_instance(&self, obj: Borrowed<'_, '_>) -> bool {
        unsafe { sys::type_of(obj.as_ptr()) == self.tp.as_ptr() }
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name())
            .field("slots", &self.context.slots)
            .finish()
    }
}
