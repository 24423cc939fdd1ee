use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::analysis::element::ScalarElement;
use crate::analysis::lattice::PrecisionKind;
use crate::analysis::sign::CompareSpecial;
use crate::ir::typing::{IntType, ScalarType};

/// Result of a meet
#[derive(Clone, Debug, PartialEq)]
pub enum Meet {
    /// no value in common
    Bottom,
    Element(ScalarElement),
}

/// An element kind of the scalar lattice
///
/// Binary lattice operations are only asked of the operand with the higher dispatch rank; an
/// implementation handles every other operand whose rank is not above its own and answers
/// `None` for anything else.
pub trait AbstractDomain {
    const PRECISION: PrecisionKind;

    fn scalar_type(&self) -> ScalarType;

    /// Join with `other`
    fn merge(&self, other: &ScalarElement) -> Option<ScalarElement>;

    /// Meet with `other`
    fn intersect(&self, other: &ScalarElement) -> Option<Meet>;

    /// Whether every value of `other` is a value of this element
    fn contain(&self, other: &ScalarElement) -> Option<bool>;

    /// Whether every value of this element is a value of the finer `source`
    fn contain_to(&self, source: &ScalarElement) -> Option<bool>;

    fn compare_special(&self) -> CompareSpecial;
}

//
// Operation families
//

/// The native family of operations of a scalar type
#[derive(Eq, PartialEq, Copy, Clone, Hash, Debug, Serialize, Deserialize)]
pub enum OperationFamily {
    Bit,
    Signed,
    Unsigned,
    Float,
}

impl OperationFamily {
    pub fn of(ty: &ScalarType) -> Self {
        match ty {
            ScalarType::Bit => Self::Bit,
            ScalarType::Int(int) if int.is_signed() => Self::Signed,
            ScalarType::Int(_) => Self::Unsigned,
            ScalarType::Float(_) => Self::Float,
        }
    }
}

impl Display for OperationFamily {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bit => write!(f, "bit"),
            Self::Signed => write!(f, "signed"),
            Self::Unsigned => write!(f, "unsigned"),
            Self::Float => write!(f, "float"),
        }
    }
}

/// Comparison bundle of a family, passed by value to the algorithms shared across families
pub struct OperationTraits<T> {
    pub family: OperationFamily,
    pub compare: fn(&T, &T) -> Ordering,
}

impl<T: Clone> OperationTraits<T> {
    pub fn less(&self, lhs: &T, rhs: &T) -> bool {
        (self.compare)(lhs, rhs) == Ordering::Less
    }

    pub fn min(&self, lhs: &T, rhs: &T) -> T {
        if self.less(rhs, lhs) {
            rhs.clone()
        } else {
            lhs.clone()
        }
    }

    pub fn max(&self, lhs: &T, rhs: &T) -> T {
        if self.less(lhs, rhs) {
            rhs.clone()
        } else {
            lhs.clone()
        }
    }
}

fn compare_floats(lhs: &f64, rhs: &f64) -> Ordering {
    lhs.partial_cmp(rhs).unwrap_or(Ordering::Equal)
}

pub static SIGNED_TRAITS: OperationTraits<BigInt> = OperationTraits {
    family: OperationFamily::Signed,
    compare: <BigInt as Ord>::cmp,
};

pub static UNSIGNED_TRAITS: OperationTraits<BigInt> = OperationTraits {
    family: OperationFamily::Unsigned,
    compare: <BigInt as Ord>::cmp,
};

/// Bundle of an integer type; values are held in their own interpretation, so both compare alike
pub fn int_traits(ty: &IntType) -> &'static OperationTraits<BigInt> {
    if ty.is_signed() {
        &SIGNED_TRAITS
    } else {
        &UNSIGNED_TRAITS
    }
}

pub static FLOAT_TRAITS: OperationTraits<f64> = OperationTraits {
    family: OperationFamily::Float,
    compare: compare_floats,
};

/// Closed range `[lo, hi]` under the order of some family
#[derive(Clone, Debug, PartialEq)]
pub struct Bounds<T> {
    pub lo: T,
    pub hi: T,
}

impl<T: Clone> Bounds<T> {
    pub fn new(lo: T, hi: T) -> Self {
        Self { lo, hi }
    }

    pub fn is_empty(&self, traits: &OperationTraits<T>) -> bool {
        traits.less(&self.hi, &self.lo)
    }

    pub fn meet(&self, other: &Self, traits: &OperationTraits<T>) -> Self {
        Self {
            lo: traits.max(&self.lo, &other.lo),
            hi: traits.min(&self.hi, &other.hi),
        }
    }
}

#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum Extremum {
    Min,
    Max,
}

/// Refine the operands of `a ⋄ b = c` where `⋄` is min or max
///
/// `min(a, b) = c` forces both operands above `c`, and an operand certainly above `c` leaves
/// the other as the only source of the result. Max is the mirror image. Returns `None` when no
/// pair of operands can produce `c`.
pub fn constrain_extremum<T: Clone>(
    traits: &OperationTraits<T>,
    extremum: Extremum,
    a: &Bounds<T>,
    b: &Bounds<T>,
    c: &Bounds<T>,
) -> Option<(Bounds<T>, Bounds<T>)> {
    let (mut lhs, mut rhs) = match extremum {
        Extremum::Min => {
            let floor = |x: &Bounds<T>| Bounds::new(traits.max(&x.lo, &c.lo), x.hi.clone());
            (floor(a), floor(b))
        }
        Extremum::Max => {
            let ceiling = |x: &Bounds<T>| Bounds::new(x.lo.clone(), traits.min(&x.hi, &c.hi));
            (ceiling(a), ceiling(b))
        }
    };
    if lhs.is_empty(traits) || rhs.is_empty(traits) {
        return None;
    }

    // an operand that can never be the result hands the result to the other one
    let out_of_reach = |x: &Bounds<T>| match extremum {
        Extremum::Min => traits.less(&c.hi, &x.lo),
        Extremum::Max => traits.less(&x.hi, &c.lo),
    };
    if out_of_reach(&lhs) {
        rhs = rhs.meet(c, traits);
    }
    if out_of_reach(&rhs) {
        lhs = lhs.meet(c, traits);
    }
    if lhs.is_empty(traits) || rhs.is_empty(traits) {
        return None;
    }

    // the reachable results must still hit c
    let reachable = match extremum {
        Extremum::Min => Bounds::new(
            traits.min(&lhs.lo, &rhs.lo),
            traits.min(&lhs.hi, &rhs.hi),
        ),
        Extremum::Max => Bounds::new(
            traits.max(&lhs.lo, &rhs.lo),
            traits.max(&lhs.hi, &rhs.hi),
        ),
    };
    if reachable.meet(c, traits).is_empty(traits) {
        return None;
    }
    Some((lhs, rhs))
}
