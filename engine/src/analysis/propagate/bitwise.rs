use num_bigint::BigInt;
use num_traits::{Signed, Zero};

use crate::analysis::context::ConstraintContext;
use crate::analysis::element::ScalarElement;
use crate::analysis::numeric::{
    bits_range_to_values, ceil_div, floor_div, hull, low_mask, rotate_amount, rotate_left,
    value_range_to_bits,
};
use crate::analysis::propagate::{Frame, Narrowing, Span};
use crate::ir::operation::Operation;
use crate::ir::typing::{pow2, IntType};

/// `!x` is its own inverse
pub(crate) fn constrain_negate(
    receiver: &ScalarElement,
    _op: &Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let frame = match Frame::of(receiver, result, ctx) {
        Some(frame) => frame,
        None => return false,
    };
    let ty = &frame.x.ty;
    let negate = |v: &BigInt| ty.from_bits(&(low_mask(ty.width()) ^ ty.to_bits(v)));
    let pieces: Vec<_> = value_range_to_bits(ty, &frame.z.lo, &frame.z.hi)
        .iter()
        .map(|(lo, hi)| (negate(&ty.from_bits(hi)), negate(&ty.from_bits(lo))))
        .collect();
    frame.commit(ctx, Narrowing::from_pieces(&pieces, true))
}

/// Bit patterns of `x` such that `x ⋄ c = r`, with `c` and `r` patterns
///
/// `None` when no pattern works; the range is the hull of the solutions.
fn solve_pattern(op: &Operation, ty: &IntType, c: &BigInt, r: &BigInt) -> Option<(BigInt, BigInt)> {
    let mask = low_mask(ty.width());
    let free = |bits: &BigInt| &mask ^ bits;
    match op {
        Operation::BitAnd => {
            // bits set in r must be set in c, bits outside c are free
            if !(r & free(c)).is_zero() {
                return None;
            }
            Some((r.clone(), r | free(c)))
        }
        Operation::BitOr => {
            // bits set in c must be set in r, bits inside c are free
            if !(c & free(r)).is_zero() {
                return None;
            }
            Some((r & free(c), r.clone()))
        }
        _ => {
            let x = c ^ r;
            Some((x.clone(), x))
        }
    }
}

/// Value range of one operand against a constant other operand and a constant result
fn solve_constant(op: &Operation, own: &Span, other: &BigInt, r: &BigInt) -> Narrowing {
    let ty = &own.ty;
    match solve_pattern(op, ty, &ty.to_bits(other), &ty.to_bits(r)) {
        None => Narrowing::Impossible,
        Some((lo, hi)) => {
            let exact = lo == hi;
            let pieces = bits_range_to_values(ty, &lo, &hi);
            match hull(&pieces) {
                None => Narrowing::Impossible,
                Some(range) => Narrowing::first(range, exact && pieces.len() == 1),
            }
        }
    }
}

/// `x & y`, `x | y` and `x ^ y`
pub(crate) fn constrain_bitwise(
    receiver: &ScalarElement,
    op: &Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let frame = match Frame::of(receiver, result, ctx) {
        Some(frame) => frame,
        None => return false,
    };
    let (x, y, z) = (&frame.x, frame.y(), &frame.z);

    if let Some(r) = z.value() {
        match (x.value(), y.value()) {
            (_, Some(c)) => return frame.commit(ctx, solve_constant(op, x, c, r)),
            (Some(c), None) => {
                let narrowing = match solve_constant(op, y, c, r) {
                    Narrowing::Bounds { first, exact, .. } => Narrowing::Bounds {
                        first: None,
                        second: first,
                        exact,
                    },
                    impossible => impossible,
                };
                return frame.commit(ctx, narrowing);
            }
            (None, None) => (),
        }
    }

    if x.is_natural() && y.is_natural() && z.is_natural() {
        // on naturals, x & y <= min(x, y) and x | y >= max(x, y)
        let narrowing = match op {
            Operation::BitAnd => Narrowing::both(
                (z.lo.clone(), x.hi.clone()),
                (z.lo.clone(), y.hi.clone()),
                false,
            ),
            Operation::BitOr => Narrowing::both(
                (x.lo.clone(), z.hi.clone()),
                (y.lo.clone(), z.hi.clone()),
                false,
            ),
            _ => Narrowing::unknown(),
        };
        return frame.commit(ctx, narrowing);
    }
    frame.commit(ctx, Narrowing::unknown())
}

/// `x << k` (wrapping) and `x >> k` (arithmetic on signed values)
pub(crate) fn constrain_shift(
    receiver: &ScalarElement,
    op: &Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let frame = match Frame::of(receiver, result, ctx) {
        Some(frame) => frame,
        None => return false,
    };
    let (x, y, z) = (&frame.x, frame.y(), &frame.z);
    let width = x.ty.width();
    let valid = (
        y.lo.clone().max(BigInt::zero()),
        y.hi.clone().min(BigInt::from(width - 1)),
    );
    let invalid = y.lo.is_negative() || y.hi >= BigInt::from(width);
    if invalid && !ctx.stops_on_error() {
        // an invalid amount yields any value
        return frame.commit(ctx, Narrowing::unknown());
    }
    if valid.0 > valid.1 {
        return frame.commit(ctx, Narrowing::Impossible);
    }
    let amounts: Vec<u32> = (0..width)
        .filter(|k| valid.0 <= BigInt::from(*k) && BigInt::from(*k) <= valid.1)
        .collect();
    let single = amounts.len() == 1;

    let mut pieces = vec![];
    match op {
        Operation::RightShift => {
            for k in [amounts[0], amounts[amounts.len() - 1]] {
                let scale = pow2(k);
                pieces.push((&z.lo * &scale, (&z.hi + 1) * &scale - 1));
            }
        }
        _ => {
            for k in &amounts {
                let scale = pow2(*k);
                if !x.ty.contains(&(&x.lo * &scale)) || !x.ty.contains(&(&x.hi * &scale)) {
                    return frame.commit(ctx, Narrowing::Bounds {
                        first: None,
                        second: Some(valid),
                        exact: false,
                    });
                }
                pieces.push((ceil_div(&z.lo, &scale), floor_div(&z.hi, &scale)));
            }
            pieces.retain(|(lo, hi)| lo <= hi);
        }
    }
    let narrowing = match hull(&pieces) {
        None => Narrowing::Impossible,
        Some(first) => Narrowing::both(first, valid, single),
    };
    frame.commit(ctx, narrowing)
}

/// Rotations, invertible once the amount and the result are known
pub(crate) fn constrain_rotate(
    receiver: &ScalarElement,
    op: &Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let frame = match Frame::of(receiver, result, ctx) {
        Some(frame) => frame,
        None => return false,
    };
    let (x, y, z) = (&frame.x, frame.y(), &frame.z);
    let width = x.ty.width();
    let amount = match y.value() {
        Some(amount) => rotate_amount(amount, width),
        None => return frame.commit(ctx, Narrowing::unknown()),
    };
    if amount == 0 {
        return frame.commit(ctx, Narrowing::first(z.bounds(), true));
    }
    let narrowing = match z.value() {
        Some(r) => {
            // undo the rotation
            let back = match op {
                Operation::LeftRotate => width - amount,
                _ => amount,
            };
            let value = rotate_left(&x.ty, r, back);
            Narrowing::first((value.clone(), value), true)
        }
        None => Narrowing::unknown(),
    };
    frame.commit(ctx, narrowing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::params::{EXACT_PROPAGATE, EXACT_STOP};

    fn u8t() -> IntType {
        IntType::unsigned(8).unwrap()
    }

    fn i8t() -> IntType {
        IntType::signed(8).unwrap()
    }

    fn range(ty: IntType, lo: i64, hi: i64) -> ScalarElement {
        ScalarElement::int_range(ty, lo, hi).unwrap()
    }

    fn int(ty: IntType, v: i64) -> ScalarElement {
        ScalarElement::int(ty, v).unwrap()
    }

    #[test]
    fn negation_is_inverted() {
        let x = range(i8t(), -10, 10);
        let mut ctx = ConstraintContext::new(&EXACT_STOP);
        assert!(x.constraint(&Operation::BitNegate, &range(i8t(), 0, 3), &mut ctx));
        assert_eq!(ctx.first(), Some(&range(i8t(), -4, -1)));
        assert!(ctx.is_exact());
    }

    #[test]
    fn masks_against_constants() {
        let x = range(u8t(), 0, 255);
        let mask = int(u8t(), 0x0f);

        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&mask);
        assert!(x.constraint(&Operation::BitAnd, &int(u8t(), 0x05), &mut ctx));
        assert_eq!(ctx.first(), Some(&range(u8t(), 0x05, 0xf5)));
        assert!(!ctx.is_exact());

        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&mask);
        assert!(x.constraint(&Operation::BitAnd, &int(u8t(), 0x10), &mut ctx));
        assert!(ctx.is_empty());

        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&mask);
        assert!(x.constraint(&Operation::BitXor, &int(u8t(), 0xff), &mut ctx));
        assert_eq!(ctx.first(), Some(&int(u8t(), 0xf0)));
        assert!(ctx.is_exact());
    }

    #[test]
    fn natural_operands_bound_each_other() {
        let (x, y) = (range(u8t(), 0, 255), range(u8t(), 0, 255));
        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&y);
        assert!(x.constraint(&Operation::BitOr, &range(u8t(), 0, 15), &mut ctx));
        assert_eq!(ctx.first(), Some(&range(u8t(), 0, 15)));
        assert_eq!(ctx.second(), Some(&range(u8t(), 0, 15)));
    }

    #[test]
    fn right_shift_widens_the_result() {
        let (x, k) = (range(u8t(), 0, 255), int(u8t(), 4));
        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&k);
        assert!(x.constraint(&Operation::RightShift, &int(u8t(), 3), &mut ctx));
        assert_eq!(ctx.first(), Some(&range(u8t(), 48, 63)));
        assert!(ctx.is_exact());
    }

    #[test]
    fn left_shift_divides_when_nothing_is_lost() {
        let (x, k) = (range(u8t(), 0, 63), int(u8t(), 2));
        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&k);
        assert!(x.constraint(&Operation::LeftShift, &range(u8t(), 10, 20), &mut ctx));
        assert_eq!(ctx.first(), Some(&range(u8t(), 3, 5)));
    }

    #[test]
    fn invalid_amounts() {
        let (x, k) = (range(u8t(), 0, 255), range(u8t(), 6, 12));
        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&k);
        assert!(x.constraint(&Operation::RightShift, &int(u8t(), 1), &mut ctx));
        assert_eq!(ctx.second(), Some(&range(u8t(), 6, 7)));

        let mut ctx = ConstraintContext::new(&EXACT_PROPAGATE).with_argument(&k);
        assert!(x.constraint(&Operation::RightShift, &int(u8t(), 1), &mut ctx));
        assert_eq!(ctx.first(), None);
        assert_eq!(ctx.second(), None);
    }

    #[test]
    fn rotation_is_undone() {
        let (x, k) = (range(u8t(), 0, 255), int(u8t(), 3));
        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&k);
        assert!(x.constraint(&Operation::LeftRotate, &int(u8t(), 0b0000_1001), &mut ctx));
        assert_eq!(ctx.first(), Some(&int(u8t(), 0b0010_0001)));
    }
}
