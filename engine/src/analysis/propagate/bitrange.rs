//
// Conversions and bit-field operations
//

use num_bigint::BigInt;
use num_traits::{FromPrimitive, Zero};

use crate::analysis::context::{Argument, ConstraintContext};
use crate::analysis::element::ScalarElement;
use crate::analysis::numeric::{bits_range_to_values, floor_div, hull, meet, value_range_to_bits};
use crate::analysis::propagate::arith::wrapped_targets;
use crate::analysis::propagate::{narrow, Frame, Narrowing};
use crate::error::invariant_violation;
use crate::ir::operation::Operation;
use crate::ir::typing::{pow2, IntType};

/// Value segments of `ty` on which an extension into `new` adds a constant offset
///
/// Each half of the bit patterns (sign bit clear, sign bit set) is one segment; entries are
/// `(lo, hi, offset)` with `extended = value + offset`.
pub(crate) fn extension_segments(
    ty: &IntType,
    sign: bool,
    new: &IntType,
) -> Vec<(BigInt, BigInt, BigInt)> {
    let half = pow2(ty.width() - 1);
    let halves = [(BigInt::zero(), &half - 1), (half.clone(), ty.modulus() - 1)];
    halves
        .iter()
        .map(|(lo, hi)| {
            let extended = if sign && lo >= &half {
                lo + new.modulus() - ty.modulus()
            } else {
                lo.clone()
            };
            let offset = new.from_bits(&extended) - ty.from_bits(lo);
            (ty.from_bits(lo), ty.from_bits(hi), offset)
        })
        .collect()
}

/// Convert bit-pattern pieces of `ty` to the hull of their values
fn values_of(ty: &IntType, pieces: &[(BigInt, BigInt)]) -> Option<(BigInt, BigInt)> {
    let values: Vec<_> = pieces
        .iter()
        .flat_map(|(lo, hi)| bits_range_to_values(ty, lo, hi))
        .collect();
    hull(&values)
}

/// Value-to-value conversion between integer types
pub(crate) fn constrain_cast_int(
    receiver: &ScalarElement,
    _op: &Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let frame = match Frame::of(receiver, result, ctx) {
        Some(frame) => frame,
        None => return false,
    };
    let pieces = wrapped_targets(ctx, &frame.z, &frame.z.ty, &frame.x.bounds());
    frame.commit(ctx, Narrowing::from_pieces(&pieces, true))
}

/// Integers whose rounding lands in the float result
pub(crate) fn constrain_cast_float(
    receiver: &ScalarElement,
    op: &Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let to = match op {
        Operation::CastFloat { to } => *to,
        _ => invariant_violation(format!("{} dispatched as a float cast", op)),
    };
    let (first, _) = ctx.operands(receiver);
    let (set, (_, x_lo, x_hi)) = match (result.float_set(), first.int_bounds()) {
        (Some(set), Some(bounds)) => (set, bounds),
        _ => return false,
    };
    let (lo, hi) = match set.bounds() {
        Some(bounds) => bounds,
        None => {
            // integers never round to NaN
            ctx.set_empty();
            ctx.merge_verdict_exact();
            return true;
        }
    };
    // rounding is monotone: an integer beyond the neighbors of the bounds cannot reach them
    let below = to.next_down(lo);
    let above = to.next_up(hi);
    let lo = match BigInt::from_f64(below.floor()) {
        Some(floor) if below.is_finite() => x_lo.max(floor + 1),
        _ => x_lo,
    };
    let hi = match BigInt::from_f64(above.ceil()) {
        Some(ceil) if above.is_finite() => x_hi.min(ceil - 1),
        _ => x_hi,
    };
    if narrow(ctx, Argument::First, first, lo, hi) {
        ctx.merge_verdict_degradate();
    } else {
        ctx.set_empty();
        ctx.merge_verdict_exact();
    }
    true
}

/// Zero and sign extensions
pub(crate) fn constrain_extend(
    receiver: &ScalarElement,
    op: &Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let frame = match Frame::of(receiver, result, ctx) {
        Some(frame) => frame,
        None => return false,
    };
    let sign = matches!(op, Operation::ExtendWithSign { .. });
    let mut pieces = vec![];
    for (seg_lo, seg_hi, offset) in extension_segments(&frame.x.ty, sign, &frame.z.ty) {
        let image = (&seg_lo + &offset, &seg_hi + &offset);
        if let Some((lo, hi)) = meet(&image, &frame.z.bounds()) {
            if let Some(piece) = meet(&(lo - &offset, hi - &offset), &frame.x.bounds()) {
                pieces.push(piece);
            }
        }
    }
    frame.commit(ctx, Narrowing::from_pieces(&pieces, true))
}

/// Patterns in `[from, to]` whose field of `count` bits at `low` lies in `[a, b]`
fn field_preimage(
    (from, to): (&BigInt, &BigInt),
    low: u32,
    count: u32,
    (a, b): (&BigInt, &BigInt),
) -> Option<(BigInt, BigInt)> {
    let unit = pow2(low);
    let period = pow2(low + count);
    let field = |p: &BigInt, base: &BigInt| floor_div(&(p - base), &unit);

    let base = floor_div(from, &period) * &period;
    let f = field(from, &base);
    let first = if a <= &f && &f <= b {
        from.clone()
    } else if &f < a {
        &base + a * &unit
    } else {
        &base + &period + a * &unit
    };

    let base = floor_div(to, &period) * &period;
    let f = field(to, &base);
    let last = if a <= &f && &f <= b {
        to.clone()
    } else if &f > b {
        &base + (b + 1) * &unit - 1
    } else {
        &base - &period + (b + 1) * &unit - 1
    };
    (first <= last).then(|| (first, last))
}

/// Field of `count` bits at `low` over the patterns `[from, to]`
fn field_image(from: &BigInt, to: &BigInt, low: u32, count: u32) -> (BigInt, BigInt) {
    let modulus = pow2(count);
    let (shifted_lo, shifted_hi) = (floor_div(from, &pow2(low)), floor_div(to, &pow2(low)));
    let (a, b) = (&shifted_lo % &modulus, &shifted_hi % &modulus);
    if &shifted_hi - &shifted_lo + 1 >= modulus || a > b {
        (BigInt::zero(), modulus - 1)
    } else {
        (a, b)
    }
}

/// Bits `[low, high)` of the receiver
pub(crate) fn constrain_reduce(
    receiver: &ScalarElement,
    op: &Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let frame = match Frame::of(receiver, result, ctx) {
        Some(frame) => frame,
        None => return false,
    };
    let (low, high) = match op.bit_range() {
        Some(range) => range,
        None => invariant_violation(format!("{} without a bit range", op)),
    };
    let (x, z) = (&frame.x, &frame.z);
    let pieces: Vec<_> = value_range_to_bits(&x.ty, &x.lo, &x.hi)
        .iter()
        .filter_map(|(from, to)| field_preimage((from, to), low, high - low, (&z.lo, &z.hi)))
        .collect();
    let narrowing = match values_of(&x.ty, &pieces) {
        None => Narrowing::Impossible,
        Some(range) => Narrowing::first(range, false),
    };
    frame.commit(ctx, narrowing)
}

/// Receiver bits on top of the argument bits
pub(crate) fn constrain_concat(
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
    let scale = pow2(y.ty.width());
    let (top_lo, top_hi) = (floor_div(&z.lo, &scale), floor_div(&z.hi, &scale));
    let same_top = top_lo == top_hi;

    let first = values_of(&x.ty, &[(top_lo, top_hi)]);
    let second = if same_top {
        values_of(&y.ty, &[(&z.lo % &scale, &z.hi % &scale)])
    } else {
        Some(y.bounds())
    };
    let narrowing = match (first, second) {
        (Some(first), Some(second)) => {
            let exact = same_top && (first.0 == first.1 || !x.ty.is_signed());
            Narrowing::both(first, second, exact)
        }
        _ => Narrowing::Impossible,
    };
    frame.commit(ctx, narrowing)
}

/// Receiver with bits `[low, high)` overwritten by the argument
pub(crate) fn constrain_bit_set(
    receiver: &ScalarElement,
    op: &Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let frame = match Frame::of(receiver, result, ctx) {
        Some(frame) => frame,
        None => return false,
    };
    let (low, high) = match op.bit_range() {
        Some(range) => range,
        None => invariant_violation(format!("{} without a bit range", op)),
    };
    let (x, y, z) = (&frame.x, frame.y(), &frame.z);
    let top = pow2(high);

    let mut kept = vec![];
    let mut fields = vec![];
    for (from, to) in value_range_to_bits(&x.ty, &z.lo, &z.hi) {
        kept.push((
            floor_div(&from, &top) * &top,
            floor_div(&to, &top) * &top + &top - 1,
        ));
        fields.push(field_image(&from, &to, low, high - low));
    }
    let narrowing = match (values_of(&x.ty, &kept), values_of(&y.ty, &fields)) {
        (Some(first), Some(second)) => Narrowing::both(first, second, false),
        _ => Narrowing::Impossible,
    };
    frame.commit(ctx, narrowing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::params::{EXACT_PROPAGATE, EXACT_STOP};
    use crate::ir::typing::FloatType;

    fn range(ty: IntType, lo: i64, hi: i64) -> ScalarElement {
        ScalarElement::int_range(ty, lo, hi).unwrap()
    }

    fn int(ty: IntType, v: i64) -> ScalarElement {
        ScalarElement::int(ty, v).unwrap()
    }

    fn i8t() -> IntType {
        IntType::signed(8).unwrap()
    }

    fn u8t() -> IntType {
        IntType::unsigned(8).unwrap()
    }

    #[test]
    fn segments_of_extensions() {
        let i16t = IntType::signed(16).unwrap();
        let b = |v: i64| BigInt::from(v);
        assert_eq!(
            extension_segments(&i8t(), true, &i16t),
            vec![(b(0), b(127), b(0)), (b(-128), b(-1), b(0))]
        );
        assert_eq!(
            extension_segments(&i8t(), false, &i16t),
            vec![(b(0), b(127), b(0)), (b(-128), b(-1), b(256))]
        );
    }

    #[test]
    fn zero_extension_is_inverted() {
        let i16t = IntType::signed(16).unwrap();
        let x = range(i8t(), -10, 10);
        let mut ctx = ConstraintContext::new(&EXACT_STOP);
        let op = Operation::extend_with_zero(8).unwrap();
        assert!(x.constraint(&op, &range(i16t, 250, 300), &mut ctx));
        assert_eq!(ctx.first(), Some(&range(i8t(), -6, -1)));
        assert!(ctx.is_exact());
    }

    #[test]
    fn narrowing_casts() {
        let i16t = IntType::signed(16).unwrap();
        let x = range(i16t, 0, 1000);
        let op = Operation::CastInt { to: u8t() };

        let mut ctx = ConstraintContext::new(&EXACT_STOP);
        assert!(x.constraint(&op, &int(u8t(), 5), &mut ctx));
        assert_eq!(ctx.first(), Some(&int(i16t, 5)));

        let mut ctx = ConstraintContext::new(&EXACT_PROPAGATE);
        assert!(x.constraint(&op, &int(u8t(), 5), &mut ctx));
        assert_eq!(ctx.first(), Some(&range(i16t, 5, 773)));
        assert!(!ctx.is_exact());
    }

    #[test]
    fn integers_rounding_into_a_float_range() {
        let x = range(u8t(), 0, 255);
        let op = Operation::CastFloat {
            to: FloatType::DOUBLE,
        };
        let z = ScalarElement::float_range(FloatType::DOUBLE, 2.5, 10.0).unwrap();
        let mut ctx = ConstraintContext::new(&EXACT_STOP);
        assert!(x.constraint(&op, &z, &mut ctx));
        assert_eq!(ctx.first(), Some(&range(u8t(), 3, 10)));
    }

    #[test]
    fn fields_of_patterns() {
        let x = range(u8t(), 0, 255);
        let mut ctx = ConstraintContext::new(&EXACT_STOP);
        let op = Operation::reduce(4, 8).unwrap();
        let u4 = IntType::unsigned(4).unwrap();
        assert!(x.constraint(&op, &int(u4, 3), &mut ctx));
        assert_eq!(ctx.first(), Some(&range(u8t(), 48, 63)));

        let (x, y) = (range(u8t(), 0, 255), range(u4, 0, 15));
        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&y);
        let op = Operation::bit_set(0, 4).unwrap();
        assert!(x.constraint(&op, &int(u8t(), 0xa5), &mut ctx));
        assert_eq!(ctx.first(), Some(&range(u8t(), 0xa0, 0xaf)));
        assert_eq!(ctx.second(), Some(&int(u4, 5)));
    }

    #[test]
    fn concatenation_splits() {
        let u16t = IntType::unsigned(16).unwrap();
        let (x, y) = (range(u8t(), 0, 255), range(u8t(), 0, 255));
        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&y);
        assert!(x.constraint(&Operation::Concat, &int(u16t, 0x1234), &mut ctx));
        assert_eq!(ctx.first(), Some(&int(u8t(), 0x12)));
        assert_eq!(ctx.second(), Some(&int(u8t(), 0x34)));
        assert!(ctx.is_exact());
    }
}
