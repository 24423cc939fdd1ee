//
// Big integer helpers for bound arithmetic
//

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::ir::typing::{pow2, IntType};

/// Quotient rounded toward negative infinity (`b != 0`)
pub fn floor_div(a: &BigInt, b: &BigInt) -> BigInt {
    let q = a / b;
    let r = a % b;
    if !r.is_zero() && (r.is_negative() != b.is_negative()) {
        q - 1
    } else {
        q
    }
}

/// Quotient rounded toward positive infinity (`b != 0`)
pub fn ceil_div(a: &BigInt, b: &BigInt) -> BigInt {
    -floor_div(&-a, b)
}

pub fn min_of<'a, I: IntoIterator<Item = &'a BigInt>>(values: I) -> Option<BigInt> {
    values.into_iter().min().cloned()
}

pub fn max_of<'a, I: IntoIterator<Item = &'a BigInt>>(values: I) -> Option<BigInt> {
    values.into_iter().max().cloned()
}

/// Closest double to an integer, infinite beyond the double range
pub fn to_f64(value: &BigInt) -> f64 {
    match value.to_f64() {
        Some(v) => v,
        None if value.is_negative() => f64::NEG_INFINITY,
        None => f64::INFINITY,
    }
}

/// Shift amount from an integer operand, if it is a valid amount for `width` bits
pub fn shift_amount(amount: &BigInt, width: u32) -> Option<u32> {
    amount.to_u32().filter(|k| *k < width)
}

/// Rotation amount normalized into `[0, width)`
pub fn rotate_amount(amount: &BigInt, width: u32) -> u32 {
    let modulus = BigInt::from(width);
    let mut k = amount % &modulus;
    if k.is_negative() {
        k += &modulus;
    }
    k.to_u32().unwrap_or(0)
}

/// Rotate the bit pattern of a value to the left
pub fn rotate_left(ty: &IntType, value: &BigInt, k: u32) -> BigInt {
    let width = ty.width();
    if k == 0 {
        return value.clone();
    }
    let bits = ty.to_bits(value);
    let rotated = ((&bits << k) | (&bits >> (width - k))) % ty.modulus();
    ty.from_bits(&rotated)
}

/// Mask of `count` low bits
pub fn low_mask(count: u32) -> BigInt {
    pow2(count) - 1
}

/// Split a value range of `ty` into at most two contiguous ranges of bit patterns
///
/// A signed range crossing zero wraps around in the unsigned view.
pub fn value_range_to_bits(ty: &IntType, lo: &BigInt, hi: &BigInt) -> Vec<(BigInt, BigInt)> {
    if lo > hi {
        return vec![];
    }
    if !lo.is_negative() || hi.is_negative() {
        return vec![(ty.to_bits(lo), ty.to_bits(hi))];
    }
    vec![
        (BigInt::zero(), ty.to_bits(hi)),
        (ty.to_bits(lo), ty.modulus() - 1),
    ]
}

/// Split a range of bit patterns into at most two contiguous value ranges of `ty`
pub fn bits_range_to_values(ty: &IntType, lo: &BigInt, hi: &BigInt) -> Vec<(BigInt, BigInt)> {
    if lo > hi {
        return vec![];
    }
    if !ty.is_signed() {
        return vec![(lo.clone(), hi.clone())];
    }
    let half = pow2(ty.width() - 1);
    if hi < &half || lo >= &half {
        return vec![(ty.from_bits(lo), ty.from_bits(hi))];
    }
    vec![
        (ty.from_bits(&half), ty.from_bits(hi)),
        (ty.from_bits(lo), ty.from_bits(&(&half - 1))),
    ]
}

/// Smallest range covering every given range
pub fn hull(ranges: &[(BigInt, BigInt)]) -> Option<(BigInt, BigInt)> {
    let lo = min_of(ranges.iter().map(|(lo, _)| lo))?;
    let hi = max_of(ranges.iter().map(|(_, hi)| hi))?;
    Some((lo, hi))
}

/// Intersection of two ranges
pub fn meet(lhs: &(BigInt, BigInt), rhs: &(BigInt, BigInt)) -> Option<(BigInt, BigInt)> {
    let lo = (&lhs.0).max(&rhs.0).clone();
    let hi = (&lhs.1).min(&rhs.1).clone();
    if lo > hi {
        None
    } else {
        Some((lo, hi))
    }
}
