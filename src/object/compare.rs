//! Rich comparison operators

use core::ffi::c_int;
use std::cmp::Ordering;
use std::fmt;

use crate::sys;

/// The six rich comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
}

impl CompareOp {
    /// Decode an operator code; `None` when out of range
    pub fn from_raw(op: c_int) -> Option<Self> {
        match op {
            sys::PY_LT => Some(Self::Lt),
            sys::PY_LE => Some(Self::Le),
            sys::PY_EQ => Some(Self::Eq),
            sys::PY_NE => Some(Self::Ne),
            sys::PY_GT => Some(Self::Gt),
            sys::PY_GE => Some(Self::Ge),
            _ => None,
        }
    }

    pub fn as_raw(self) -> c_int {
        match self {
            Self::Lt => sys::PY_LT,
            Self::Le => sys::PY_LE,
            Self::Eq => sys::PY_EQ,
            Self::Ne => sys::PY_NE,
            Self::Gt => sys::PY_GT,
            Self::Ge => sys::PY_GE,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    /// The operator that gives the same answer with operands swapped
    pub fn swapped(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
            op => op,
        }
    }

    /// Whether an ordering of `self`-side against `other`-side satisfies the operator
    pub fn matches(self, ordering: Ordering) -> bool {
        match self {
            Self::Lt => ordering.is_lt(),
            Self::Le => ordering.is_le(),
            Self::Eq => ordering.is_eq(),
            Self::Ne => ordering.is_ne(),
            Self::Gt => ordering.is_gt(),
            Self::Ge => ordering.is_ge(),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_codes_round_trip() {
        for raw in 0..6 {
            let op = CompareOp::from_raw(raw).unwrap();
            assert_eq!(op.as_raw(), raw);
        }
        assert_eq!(CompareOp::from_raw(6), None);
        assert_eq!(CompareOp::from_raw(-1), None);
    }

    #[test]
    fn test_swapped_is_consistent() {
        let orderings = [Ordering::Less, Ordering::Equal, Ordering::Greater];
        for raw in 0..6 {
            let op = CompareOp::from_raw(raw).unwrap();
            for ord in orderings {
                assert_eq!(op.matches(ord), op.swapped().matches(ord.reverse()));
            }
        }
    }
}
