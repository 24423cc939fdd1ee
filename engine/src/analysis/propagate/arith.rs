use num_bigint::BigInt;
use num_traits::Signed;

use crate::analysis::context::ConstraintContext;
use crate::analysis::element::ScalarElement;
use crate::analysis::numeric::{ceil_div, floor_div, hull, meet};
use crate::analysis::propagate::{nonzero_parts, Frame, Narrowing, Span};
use crate::ir::operation::Operation;
use crate::ir::typing::IntType;

/// Beyond this many wrap-arounds the targets are taken as one hull
const WRAP_PIECES: usize = 4;

/// Mathematical results in `span` that land in `z` once stored in `ty`
///
/// Stopping on errors prunes every wrapped result; otherwise each wrap-around by the modulus
/// contributes one piece.
pub(crate) fn wrapped_targets(
    ctx: &ConstraintContext<'_>,
    z: &Span,
    ty: &IntType,
    span: &(BigInt, BigInt),
) -> Vec<(BigInt, BigInt)> {
    if ctx.stops_on_error() {
        return meet(span, &z.bounds()).into_iter().collect();
    }
    let modulus = ty.modulus();
    let first = ceil_div(&(&span.0 - &z.hi), &modulus);
    let last = floor_div(&(&span.1 - &z.lo), &modulus);
    if first > last {
        return vec![];
    }
    if &last - &first >= BigInt::from(WRAP_PIECES) {
        let lo = &z.lo + &first * &modulus;
        let hi = &z.hi + &last * &modulus;
        return meet(span, &(lo, hi)).into_iter().collect();
    }
    let mut pieces = vec![];
    let mut k = first;
    while k <= last {
        let shift = &k * &modulus;
        if let Some(piece) = meet(span, &(&z.lo + &shift, &z.hi + &shift)) {
            pieces.push(piece);
        }
        k += 1;
    }
    pieces
}

/// `x - 1`, `x + 1` and `-x`
pub(crate) fn constrain_step(
    receiver: &ScalarElement,
    op: &Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let frame = match Frame::of(receiver, result, ctx) {
        Some(frame) => frame,
        None => return false,
    };
    let x = &frame.x;
    let span = match op {
        Operation::Prev => (&x.lo - 1, &x.hi - 1),
        Operation::Next => (&x.lo + 1, &x.hi + 1),
        _ => (-&x.hi, -&x.lo),
    };
    let pieces: Vec<_> = wrapped_targets(ctx, &frame.z, &x.ty, &span)
        .into_iter()
        .map(|(a, b)| match op {
            Operation::Prev => (a + 1, b + 1),
            Operation::Next => (a - 1, b - 1),
            _ => (-b, -a),
        })
        .collect();
    frame.commit(ctx, Narrowing::from_pieces(&pieces, true))
}

/// `x + y` and `x - y`
pub(crate) fn constrain_additive(
    receiver: &ScalarElement,
    op: &Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let frame = match Frame::of(receiver, result, ctx) {
        Some(frame) => frame,
        None => return false,
    };
    let (x, y) = (&frame.x, frame.y());
    let plus = matches!(op, Operation::Plus);
    let span = if plus {
        (&x.lo + &y.lo, &x.hi + &y.hi)
    } else {
        (&x.lo - &y.hi, &x.hi - &y.lo)
    };

    let mut pairs = vec![];
    for (a, b) in wrapped_targets(ctx, &frame.z, &x.ty, &span) {
        let pair = if plus {
            ((&a - &y.hi, &b - &y.lo), (&a - &x.hi, &b - &x.lo))
        } else {
            ((&a + &y.lo, &b + &y.hi), (&x.lo - &b, &x.hi - &a))
        };
        pairs.push(pair);
    }
    frame.commit(ctx, Narrowing::from_pairs(&pairs, true))
}

/// Values of one factor given the product range `t` and the other factor
///
/// A zero in the other factor leaves this one free when the product may be zero.
fn cofactors(t: &(BigInt, BigInt), own: &Span, other: &Span) -> Vec<(BigInt, BigInt)> {
    let (a, b) = t;
    if other.has_zero() && !a.is_positive() && !b.is_negative() {
        return vec![own.bounds()];
    }
    let mut pieces = vec![];
    for (p, q) in nonzero_parts(&other.bounds()) {
        let corners = [(a, &p), (a, &q), (b, &p), (b, &q)];
        let lo = corners.iter().map(|(n, d)| ceil_div(n, d)).min();
        let hi = corners.iter().map(|(n, d)| floor_div(n, d)).max();
        if let (Some(lo), Some(hi)) = (lo, hi) {
            if let Some(piece) = meet(&(lo, hi), &own.bounds()) {
                pieces.push(piece);
            }
        }
    }
    pieces
}

/// `x * y`
pub(crate) fn constrain_times(
    receiver: &ScalarElement,
    _op: &Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let frame = match Frame::of(receiver, result, ctx) {
        Some(frame) => frame,
        None => return false,
    };
    let (x, y) = (&frame.x, frame.y());
    let corners = [&x.lo * &y.lo, &x.lo * &y.hi, &x.hi * &y.lo, &x.hi * &y.hi];
    let span = match hull(&corners.iter().map(|c| (c.clone(), c.clone())).collect::<Vec<_>>()) {
        Some(span) => span,
        None => return frame.commit(ctx, Narrowing::unknown()),
    };
    let wraps = !x.ty.contains(&span.0) || !x.ty.contains(&span.1);
    if wraps && !ctx.stops_on_error() {
        return frame.commit(ctx, Narrowing::unknown());
    }
    let t = match meet(&span, &frame.z.bounds()) {
        Some(t) => t,
        None => return frame.commit(ctx, Narrowing::Impossible),
    };
    let firsts = cofactors(&t, x, y);
    let seconds = cofactors(&t, y, x);
    match (hull(&firsts), hull(&seconds)) {
        (Some(first), Some(second)) => frame.commit(ctx, Narrowing::both(first, second, false)),
        _ => frame.commit(ctx, Narrowing::Impossible),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::context::EvalParams;
    use crate::analysis::params::{EXACT_PROPAGATE, EXACT_STOP};
    use crate::ir::typing::IntType;

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

    fn refine<'a>(
        params: &EvalParams,
        x: &ScalarElement,
        op: Operation,
        y: &'a ScalarElement,
        z: &ScalarElement,
    ) -> ConstraintContext<'a> {
        let mut ctx = ConstraintContext::new(params).with_argument(y);
        assert!(x.constraint(&op, z, &mut ctx));
        ctx
    }

    #[test]
    fn plus_inverts_without_wrapping() {
        let (x, y) = (range(u8t(), 0, 100), range(u8t(), 10, 20));
        let ctx = refine(&EXACT_STOP, &x, Operation::Plus, &y, &int(u8t(), 15));
        assert_eq!(ctx.first(), Some(&range(u8t(), 0, 5)));
        assert_eq!(ctx.second(), Some(&range(u8t(), 10, 15)));
    }

    #[test]
    fn plus_follows_the_wrap_around() {
        let (x, y) = (range(u8t(), 250, 255), int(u8t(), 10));
        let z = range(u8t(), 4, 6);

        let ctx = refine(&EXACT_PROPAGATE, &x, Operation::Plus, &y, &z);
        assert_eq!(ctx.first(), Some(&range(u8t(), 250, 252)));
        assert!(ctx.is_exact());

        let ctx = refine(&EXACT_STOP, &x, Operation::Plus, &y, &z);
        assert!(ctx.is_empty());
    }

    #[test]
    fn minus_refines_both_sides() {
        let (x, y) = (range(i8t(), -10, 10), range(i8t(), 0, 5));
        let ctx = refine(&EXACT_STOP, &x, Operation::Minus, &y, &int(i8t(), 8));
        assert_eq!(ctx.first(), Some(&range(i8t(), 8, 10)));
        assert_eq!(ctx.second(), Some(&range(i8t(), 0, 2)));
    }

    #[test]
    fn steps_invert() {
        let x = range(i8t(), -5, 5);
        let mut ctx = ConstraintContext::new(&EXACT_STOP);
        assert!(x.constraint(&Operation::Opposite, &range(i8t(), 2, 20), &mut ctx));
        assert_eq!(ctx.first(), Some(&range(i8t(), -5, -2)));

        let mut ctx = ConstraintContext::new(&EXACT_STOP);
        assert!(x.constraint(&Operation::Next, &int(i8t(), 0), &mut ctx));
        assert_eq!(ctx.first(), Some(&int(i8t(), -1)));
    }

    #[test]
    fn times_divides_the_result() {
        let (x, y) = (range(i8t(), -20, 20), range(i8t(), 2, 4));
        let ctx = refine(&EXACT_STOP, &x, Operation::Times, &y, &range(i8t(), 8, 12));
        assert_eq!(ctx.first(), Some(&range(i8t(), 2, 6)));
        assert_eq!(ctx.second(), None);
        assert!(!ctx.is_exact());

        // a zero factor cannot produce a nonzero product
        let (x, y) = (range(i8t(), 0, 3), int(i8t(), 0));
        let ctx = refine(&EXACT_STOP, &x, Operation::Times, &y, &int(i8t(), 5));
        assert!(ctx.is_empty());
    }

    #[test]
    fn wrapped_targets_split_per_turn() {
        let z = Span {
            ty: u8t(),
            lo: BigInt::from(0),
            hi: BigInt::from(9),
        };
        let ctx = ConstraintContext::new(&EXACT_PROPAGATE);
        let pieces = wrapped_targets(&ctx, &z, &u8t(), &(BigInt::from(5), BigInt::from(600)));
        assert_eq!(
            pieces,
            vec![
                (BigInt::from(5), BigInt::from(9)),
                (BigInt::from(256), BigInt::from(265)),
                (BigInt::from(512), BigInt::from(521)),
            ]
        );
    }
}
