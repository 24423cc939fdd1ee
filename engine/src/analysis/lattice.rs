use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::invariant_violation;

/// Shape of an abstract element
///
/// The declaration order is the dispatch rank: for a binary lattice operation, the operand with
/// the higher rank drives the computation.
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Hash, Debug, Serialize, Deserialize)]
pub enum PrecisionKind {
    Constant,
    CompileTimeConstant,
    Variable,
    FormalOperation,
    Guard,
    Pointer,
    Unprecise,
    Interval,
    Conjunction,
    Disjunction,
    Top,
    Unknown,
}

/// Groups of kinds that the precision order can compare with each other
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
enum Band {
    Atomic,
    Shape,
    Universal,
}

impl PrecisionKind {
    fn band(self) -> Band {
        match self {
            Self::Constant
            | Self::CompileTimeConstant
            | Self::Variable
            | Self::FormalOperation
            | Self::Guard
            | Self::Pointer => Band::Atomic,
            Self::Interval | Self::Conjunction | Self::Disjunction => Band::Shape,
            Self::Unprecise | Self::Top | Self::Unknown => Band::Universal,
        }
    }

    /// Total order used to pick the driving operand of a binary operation
    pub fn rank_cmp(self, other: Self) -> Ordering {
        self.cmp(&other)
    }

    /// Precision order, `None` when the two kinds live in different bands
    pub fn precision_partial_cmp(self, other: Self) -> Option<Ordering> {
        let (lhs, rhs) = (self.band(), other.band());
        if lhs == rhs || lhs == Band::Universal || rhs == Band::Universal {
            Some(self.cmp(&other))
        } else {
            None
        }
    }

    /// Precision order; comparing across bands is a caller error
    pub fn precision_cmp(self, other: Self) -> Ordering {
        match self.precision_partial_cmp(other) {
            Some(ordering) => ordering,
            None => invariant_violation(format!(
                "precision kinds {} and {} are not comparable",
                self, other
            )),
        }
    }

    /// Whether an element of this kind stands for exactly one value
    pub fn is_atomic(self) -> bool {
        self.band() == Band::Atomic
    }
}

impl Display for PrecisionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Constant => "constant",
            Self::CompileTimeConstant => "compile-time-constant",
            Self::Variable => "variable",
            Self::FormalOperation => "formal-operation",
            Self::Guard => "guard",
            Self::Pointer => "pointer",
            Self::Unprecise => "unprecise",
            Self::Interval => "interval",
            Self::Conjunction => "conjunction",
            Self::Disjunction => "disjunction",
            Self::Top => "top",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}
