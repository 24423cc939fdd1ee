use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};

use crate::analysis::context::ConstraintContext;
use crate::analysis::element::ScalarElement;
use crate::analysis::numeric::{floor_div, hull, meet};
use crate::analysis::propagate::{nonzero_parts, Frame, Narrowing};
use crate::ir::operation::Operation;

/// Smallest and largest magnitude in a range
fn magnitudes(range: &(BigInt, BigInt)) -> (BigInt, BigInt) {
    let (lo, hi) = range;
    let largest = lo.abs().max(hi.abs());
    if !lo.is_positive() && !hi.is_negative() {
        (BigInt::zero(), largest)
    } else {
        (lo.abs().min(hi.abs()), largest)
    }
}

/// Split a range into its negative, zero and positive parts
fn sign_parts(range: &(BigInt, BigInt)) -> Vec<(BigInt, BigInt)> {
    let mut parts = nonzero_parts(range);
    if !range.0.is_positive() && !range.1.is_negative() {
        parts.push((BigInt::zero(), BigInt::zero()));
    }
    parts
}

/// Dividends whose truncated quotient by a positive `[p, q]` falls in a one-signed `[a, b]`
fn dividends_by_positive(t: &(BigInt, BigInt), p: &BigInt, q: &BigInt) -> (BigInt, BigInt) {
    let (a, b) = t;
    if a.is_positive() {
        (a * p, b * q + q - 1)
    } else if b.is_negative() {
        (a * q - (q - 1), b * p)
    } else {
        (BigInt::one() - q, q - BigInt::one())
    }
}

/// Dividends whose quotient by the one-signed `part` falls in `t`
fn dividends(t: &(BigInt, BigInt), part: &(BigInt, BigInt)) -> Option<(BigInt, BigInt)> {
    // x / y = t is x / (-y) = -t
    let negative = part.0.is_negative();
    let (p, q) = if negative {
        (-&part.1, -&part.0)
    } else {
        part.clone()
    };
    let t = if negative {
        (-&t.1, -&t.0)
    } else {
        t.clone()
    };
    let pieces: Vec<_> = sign_parts(&t)
        .iter()
        .map(|piece| dividends_by_positive(piece, &p, &q))
        .collect();
    hull(&pieces)
}

/// Divisors in `part` that bring some dividend of `x` to some quotient of `t`
///
/// `|t| * |y| <= |x| < (|t| + 1) * |y|` bounds the magnitude of the divisor.
fn divisors(
    x: &(BigInt, BigInt),
    t: &(BigInt, BigInt),
    part: &(BigInt, BigInt),
) -> Option<(BigInt, BigInt)> {
    let (x_min, x_max) = magnitudes(x);
    let (t_min, t_max) = magnitudes(t);
    let least = floor_div(&x_min, &(t_max + BigInt::one())) + BigInt::one();
    let most = if t_min.is_zero() {
        part.0.abs().max(part.1.abs())
    } else {
        floor_div(&x_max, &t_min)
    };
    let allowed = if part.0.is_negative() {
        (-most, -least)
    } else {
        (least, most)
    };
    meet(&allowed, part)
}

/// `x / y`, truncated toward zero
pub(crate) fn constrain_divide(
    receiver: &ScalarElement,
    _op: &Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let frame = match Frame::of(receiver, result, ctx) {
        Some(frame) => frame,
        None => return false,
    };
    let (x, y, z) = (&frame.x, frame.y(), &frame.z);
    if y.has_zero() && !ctx.stops_on_error() {
        // a zero divisor yields any value
        return frame.commit(ctx, Narrowing::unknown());
    }

    let t = z.bounds();
    let mut pairs = vec![];
    for part in nonzero_parts(&y.bounds()) {
        let xs = match dividends(&t, &part).and_then(|xs| meet(&xs, &x.bounds())) {
            Some(xs) => xs,
            None => continue,
        };
        if let Some(ys) = divisors(&xs, &t, &part) {
            pairs.push((xs, ys));
        }
    }

    // MIN / -1 wraps back to MIN
    let ty = &x.ty;
    let minus_one = BigInt::from(-1);
    if ty.is_signed()
        && !ctx.stops_on_error()
        && z.contains(&ty.min_value())
        && x.contains(&ty.min_value())
        && y.contains(&minus_one)
    {
        let min = ty.min_value();
        pairs.push(((min.clone(), min), (minus_one.clone(), minus_one)));
    }
    frame.commit(ctx, Narrowing::from_pairs(&pairs, false))
}

/// `x % y`, with the sign of `x`
///
/// Only a result excluding zero carries information: it fixes the sign of the dividend and
/// bounds both magnitudes from below.
pub(crate) fn constrain_modulo(
    receiver: &ScalarElement,
    _op: &Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let frame = match Frame::of(receiver, result, ctx) {
        Some(frame) => frame,
        None => return false,
    };
    let (x, y, z) = (&frame.x, frame.y(), &frame.z);
    if z.has_zero() || (y.has_zero() && !ctx.stops_on_error()) {
        return frame.commit(ctx, Narrowing::unknown());
    }

    let first = if z.lo.is_positive() {
        meet(&(z.lo.clone(), x.hi.clone()), &x.bounds())
    } else {
        meet(&(x.lo.clone(), z.hi.clone()), &x.bounds())
    };
    let (least, _) = magnitudes(&z.bounds());
    let bound = least + BigInt::one();
    let seconds: Vec<_> = nonzero_parts(&y.bounds())
        .into_iter()
        .filter_map(|part| {
            let allowed = if part.0.is_negative() {
                (part.0.clone(), -&bound)
            } else {
                (bound.clone(), part.1.clone())
            };
            meet(&allowed, &part)
        })
        .collect();
    match (first, hull(&seconds)) {
        (Some(first), Some(second)) => frame.commit(ctx, Narrowing::both(first, second, false)),
        _ => frame.commit(ctx, Narrowing::Impossible),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::params::{EXACT_PROPAGATE, EXACT_STOP};
    use crate::ir::typing::IntType;

    fn range(ty: IntType, lo: i64, hi: i64) -> ScalarElement {
        ScalarElement::int_range(ty, lo, hi).unwrap()
    }

    fn int(ty: IntType, v: i64) -> ScalarElement {
        ScalarElement::int(ty, v).unwrap()
    }

    #[test]
    fn quotient_bounds_both_operands() {
        let u32t = IntType::unsigned(32).unwrap();
        let (x, y) = (range(u32t, 0, 100), range(u32t, 1, 100));
        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&y);
        assert!(x.constraint(&Operation::Divide, &int(u32t, 2), &mut ctx));
        assert_eq!(ctx.first(), Some(&range(u32t, 2, 100)));
        assert_eq!(ctx.second(), Some(&range(u32t, 1, 50)));
        assert!(!ctx.is_exact());
    }

    #[test]
    fn negative_quotients() {
        let i8t = IntType::signed(8).unwrap();
        let (x, y) = (range(i8t, -100, 100), int(i8t, -3));
        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&y);
        assert!(x.constraint(&Operation::Divide, &int(i8t, 4), &mut ctx));
        assert_eq!(ctx.first(), Some(&range(i8t, -14, -12)));
    }

    #[test]
    fn zero_divisor() {
        let i8t = IntType::signed(8).unwrap();
        let (x, zero) = (range(i8t, -5, 5), int(i8t, 0));
        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&zero);
        assert!(x.constraint(&Operation::Divide, &int(i8t, 1), &mut ctx));
        assert!(ctx.is_empty());

        let y = range(i8t, 0, 2);
        let mut ctx = ConstraintContext::new(&EXACT_PROPAGATE).with_argument(&y);
        assert!(x.constraint(&Operation::Divide, &int(i8t, 1), &mut ctx));
        assert_eq!(ctx.first(), None);
        assert!(!ctx.is_exact());
    }

    #[test]
    fn wrapped_quotient_is_kept() {
        let i8t = IntType::signed(8).unwrap();
        let (x, y) = (range(i8t, -128, -100), range(i8t, -1, -1));
        let mut ctx = ConstraintContext::new(&EXACT_PROPAGATE).with_argument(&y);
        assert!(x.constraint(&Operation::Divide, &int(i8t, -128), &mut ctx));
        assert_eq!(ctx.first(), Some(&int(i8t, -128)));
        assert!(!ctx.is_empty());
    }

    #[test]
    fn remainder_fixes_signs() {
        let i8t = IntType::signed(8).unwrap();
        let (x, y) = (range(i8t, -10, 10), range(i8t, 1, 5));
        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&y);
        assert!(x.constraint(&Operation::Modulo, &int(i8t, 2), &mut ctx));
        assert_eq!(ctx.first(), Some(&range(i8t, 2, 10)));
        assert_eq!(ctx.second(), Some(&range(i8t, 3, 5)));

        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&y);
        assert!(x.constraint(&Operation::Modulo, &int(i8t, 7), &mut ctx));
        assert!(ctx.is_empty());
    }
}
