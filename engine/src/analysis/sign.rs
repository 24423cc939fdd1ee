//
// Compare-special classification: where a value set sits relative to a few landmarks
//

use std::fmt::{Debug, Formatter};

use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};
use serde::{Deserialize, Serialize};

use crate::ir::typing::{FloatType, IntType};

/// Landmark values a set can be classified against
#[derive(Eq, PartialEq, Copy, Clone, Hash, Debug, Serialize, Deserialize)]
#[repr(u8)]
pub enum Landmark {
    Negative = 1 << 0,
    Zero = 1 << 1,
    Positive = 1 << 2,
    MinusOne = 1 << 3,
    One = 1 << 4,
    Min = 1 << 5,
    Max = 1 << 6,
}

impl Landmark {
    pub const ALL: [Landmark; 7] = [
        Self::Negative,
        Self::Zero,
        Self::Positive,
        Self::MinusOne,
        Self::One,
        Self::Min,
        Self::Max,
    ];

    fn mask(self) -> u8 {
        self as u8
    }
}

const ALL_MASK: u8 = (1 << 7) - 1;

/// Compact summary of a value set
///
/// `may` holds the landmarks some value of the set hits, `sure` those every value hits.
/// The empty set hits nothing and satisfies everything, hence `may = 0, sure = all`.
#[derive(Eq, PartialEq, Copy, Clone, Hash, Serialize, Deserialize)]
pub struct CompareSpecial {
    may: u8,
    sure: u8,
}

impl CompareSpecial {
    pub fn bottom() -> Self {
        Self {
            may: 0,
            sure: ALL_MASK,
        }
    }

    /// Nothing is known
    pub fn unknown() -> Self {
        Self {
            may: ALL_MASK,
            sure: 0,
        }
    }

    fn singleton(hits: u8) -> Self {
        Self {
            may: hits,
            sure: hits,
        }
    }

    /// Classify a single integer value of the given type
    pub fn of_value(ty: &IntType, value: &BigInt) -> Self {
        let mut hits = 0;
        if value.is_negative() {
            hits |= Landmark::Negative.mask();
        } else if value.is_zero() {
            hits |= Landmark::Zero.mask();
        } else {
            hits |= Landmark::Positive.mask();
        }
        if *value == -BigInt::one() {
            hits |= Landmark::MinusOne.mask();
        }
        if value.is_one() {
            hits |= Landmark::One.mask();
        }
        if *value == ty.min_value() {
            hits |= Landmark::Min.mask();
        }
        if *value == ty.max_value() {
            hits |= Landmark::Max.mask();
        }
        Self::singleton(hits)
    }

    /// Classify a boolean (a one-bit unsigned value)
    pub fn of_bit(value: bool) -> Self {
        let ty = IntType::bit_view();
        Self::of_value(&ty, &BigInt::from(value as u8))
    }

    /// Classify every value in `[lo, hi]`
    pub fn of_range(ty: &IntType, lo: &BigInt, hi: &BigInt) -> Self {
        if lo > hi {
            return Self::bottom();
        }
        if lo == hi {
            return Self::of_value(ty, lo);
        }

        let mut may = 0;
        let contains = |v: &BigInt| lo <= v && v <= hi;
        if lo.is_negative() {
            may |= Landmark::Negative.mask();
        }
        if contains(&BigInt::zero()) {
            may |= Landmark::Zero.mask();
        }
        if hi.is_positive() {
            may |= Landmark::Positive.mask();
        }
        if contains(&-BigInt::one()) {
            may |= Landmark::MinusOne.mask();
        }
        if contains(&BigInt::one()) {
            may |= Landmark::One.mask();
        }
        if contains(&ty.min_value()) {
            may |= Landmark::Min.mask();
        }
        if contains(&ty.max_value()) {
            may |= Landmark::Max.mask();
        }

        // a range of two or more values can only be sure of its sign
        let mut sure = 0;
        if hi.is_negative() {
            sure |= Landmark::Negative.mask();
        }
        if lo.is_positive() {
            sure |= Landmark::Positive.mask();
        }
        Self { may, sure }
    }

    /// Classify a float constant; NaN hits no landmark at all
    pub fn of_float(ty: &FloatType, value: f64) -> Self {
        if value.is_nan() {
            return Self::singleton(0);
        }
        Self::of_float_range(ty, value, value)
    }

    /// Classify every float in `[lo, hi]` (no NaN)
    pub fn of_float_range(ty: &FloatType, lo: f64, hi: f64) -> Self {
        if lo > hi {
            return Self::bottom();
        }
        let contains = |v: f64| lo <= v && v <= hi;
        let mut may = 0;
        if lo < 0.0 {
            may |= Landmark::Negative.mask();
        }
        if contains(0.0) {
            may |= Landmark::Zero.mask();
        }
        if hi > 0.0 {
            may |= Landmark::Positive.mask();
        }
        if contains(-1.0) {
            may |= Landmark::MinusOne.mask();
        }
        if contains(1.0) {
            may |= Landmark::One.mask();
        }
        if lo == f64::NEG_INFINITY || lo <= -ty.max_finite() {
            may |= Landmark::Min.mask();
        }
        if hi == f64::INFINITY || hi >= ty.max_finite() {
            may |= Landmark::Max.mask();
        }
        if lo == hi {
            return Self::singleton(may);
        }
        let mut sure = 0;
        if hi < 0.0 {
            sure |= Landmark::Negative.mask();
        }
        if lo > 0.0 {
            sure |= Landmark::Positive.mask();
        }
        Self { may, sure }
    }

    pub fn may(&self, landmark: Landmark) -> bool {
        self.may & landmark.mask() != 0
    }

    pub fn is(&self, landmark: Landmark) -> bool {
        self.sure & landmark.mask() != 0
    }

    pub fn is_bottom(&self) -> bool {
        self.may == 0 && self.sure == ALL_MASK
    }

    pub fn may_be_zero(&self) -> bool {
        self.may(Landmark::Zero)
    }

    pub fn is_zero(&self) -> bool {
        self.is(Landmark::Zero)
    }

    /// Every value is different from zero
    pub fn is_nonzero(&self) -> bool {
        !self.may_be_zero()
    }

    /// Some value is different from zero
    pub fn may_be_nonzero(&self) -> bool {
        !self.is_zero()
    }

    /// Classification of the union of both sets
    pub fn join(&self, other: &Self) -> Self {
        Self {
            may: self.may | other.may,
            sure: self.sure & other.sure,
        }
    }

    /// Classification of values in both sets (as far as the summaries tell)
    pub fn meet(&self, other: &Self) -> Self {
        Self {
            may: self.may & other.may,
            sure: self.sure | other.sure,
        }
    }
}

impl Debug for CompareSpecial {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_list();
        for landmark in Landmark::ALL {
            if self.is(landmark) {
                list.entry(&format_args!("{:?}!", landmark));
            } else if self.may(landmark) {
                list.entry(&format_args!("{:?}?", landmark));
            }
        }
        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn i8t() -> IntType {
        IntType::signed(8).unwrap()
    }

    #[test]
    fn classify_constants() {
        let minus_one = CompareSpecial::of_value(&i8t(), &BigInt::from(-1));
        assert!(minus_one.is(Landmark::Negative));
        assert!(minus_one.is(Landmark::MinusOne));
        assert!(!minus_one.may(Landmark::Zero));

        let min = CompareSpecial::of_value(&i8t(), &BigInt::from(-128));
        assert!(min.is(Landmark::Min));

        let truth = CompareSpecial::of_bit(true);
        assert!(truth.is(Landmark::One));
        assert!(truth.is(Landmark::Max));
        assert!(truth.is_nonzero());
    }

    #[test]
    fn classify_ranges() {
        let range = CompareSpecial::of_range(&i8t(), &BigInt::from(-3), &BigInt::from(5));
        assert!(range.may(Landmark::Zero));
        assert!(!range.is(Landmark::Zero));
        assert!(range.may(Landmark::MinusOne));
        assert!(!range.may(Landmark::Min));

        let positive = CompareSpecial::of_range(&i8t(), &BigInt::from(2), &BigInt::from(127));
        assert!(positive.is(Landmark::Positive));
        assert!(positive.may(Landmark::Max));
        assert!(positive.is_nonzero());
    }

    #[test]
    fn join_and_meet() {
        let zero = CompareSpecial::of_value(&i8t(), &BigInt::zero());
        let one = CompareSpecial::of_value(&i8t(), &BigInt::one());
        let both = zero.join(&one);
        assert!(both.may(Landmark::Zero) && both.may(Landmark::One));
        assert!(!both.is(Landmark::Zero));
        assert_eq!(zero.join(&CompareSpecial::bottom()), zero);

        let none = zero.meet(&one);
        assert!(!none.may(Landmark::Zero));
        assert!(none.is(Landmark::Zero) && none.is(Landmark::One));
    }
}
