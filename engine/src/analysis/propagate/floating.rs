//
// Backward refinement of float operands
//
// Rounding makes exact inversion impractical: operands are bounded through the neighbors of
// the result bounds, and NaN is removed wherever it would have reached the result.
//

use log::trace;
use num_bigint::BigInt;
use num_traits::{FromPrimitive, Signed};

use crate::analysis::context::{Argument, ConstraintContext};
use crate::analysis::element::ScalarElement;
use crate::analysis::float::FloatSet;
use crate::analysis::generic::{constrain_extremum, Bounds, Extremum, FLOAT_TRAITS};
use crate::analysis::numeric::to_f64;
use crate::analysis::propagate::logical;
use crate::error::invariant_violation;
use crate::ir::operation::{Operation, OperationKind};
use crate::ir::typing::FloatType;

const INF: f64 = f64::INFINITY;
const NEG_INF: f64 = f64::NEG_INFINITY;

fn float_type(element: &ScalarElement) -> FloatType {
    element
        .scalar_type()
        .as_float()
        .unwrap_or_else(|| invariant_violation(format!("float refinement of {}", element)))
}

fn set_of(element: &ScalarElement) -> FloatSet {
    element
        .float_set()
        .unwrap_or_else(|| invariant_violation(format!("float refinement of {}", element)))
}

fn same_set(lhs: &FloatSet, rhs: &FloatSet) -> bool {
    lhs.may_be_nan() == rhs.may_be_nan()
        && match (lhs.bounds(), rhs.bounds()) {
            (Some((a, b)), Some((c, d))) => a == c && b == d,
            (None, None) => true,
            _ => false,
        }
}

/// Meet a float operand with `bound`; false when nothing is left
///
/// A refined range ending on zero holds both zeros.
fn refine_float(
    ctx: &mut ConstraintContext<'_>,
    slot: Argument,
    element: &ScalarElement,
    bound: &FloatSet,
) -> bool {
    let set = set_of(element);
    let met = set.meet(bound);
    if met.is_empty() {
        return false;
    }
    if same_set(&met, &set) {
        return true;
    }
    let met = match met.bounds() {
        Some((lo, hi)) => {
            let lo = if lo == 0.0 { -0.0 } else { lo };
            let hi = if hi == 0.0 { 0.0 } else { hi };
            FloatSet::range(lo, hi).with_nan(met.may_be_nan())
        }
        None => met,
    };
    match ScalarElement::from_float_set(float_type(element), &met) {
        Some(refined) => {
            ctx.refine(slot, refined);
            true
        }
        None => false,
    }
}

/// Outcome of refining one or two operands
enum Bound {
    Keep,
    To(FloatSet),
}

fn bound(range: Option<(f64, f64)>, nan: bool) -> Bound {
    let set = match range {
        Some((lo, hi)) if lo <= hi => FloatSet::range(lo, hi),
        _ => FloatSet::empty(),
    };
    Bound::To(set.with_nan(nan))
}

/// Apply the bounds of both operands, then record the verdict
fn settle(
    ctx: &mut ConstraintContext<'_>,
    first: &ScalarElement,
    second: Option<&ScalarElement>,
    bounds: (Bound, Bound),
    exact: bool,
) -> bool {
    let mut alive = true;
    if let Bound::To(set) = &bounds.0 {
        alive &= refine_float(ctx, Argument::First, first, set);
    }
    if let (Some(second), Bound::To(set)) = (second, &bounds.1) {
        if alive {
            alive = refine_float(ctx, Argument::Second, second, set);
        }
    }
    if alive {
        ctx.merge_verdict(exact);
    } else {
        ctx.set_empty();
        ctx.merge_verdict_exact();
    }
    true
}

fn operand<'r>(second: Option<&'r ScalarElement>, op: &Operation) -> &'r ScalarElement {
    second.unwrap_or_else(|| invariant_violation(format!("{} refined without its operand", op)))
}

/// Ranges where an ordered comparison holds, NaN excluded
fn relate(
    ty: &FloatType,
    kind: OperationKind,
    x: (f64, f64),
    y: (f64, f64),
) -> (Option<(f64, f64)>, Option<(f64, f64)>) {
    use OperationKind::*;

    match kind {
        CompareLess => (
            Some((x.0, ty.next_down(y.1))),
            Some((ty.next_up(x.0), y.1)),
        ),
        CompareLessOrEqual => (Some((x.0, y.1)), Some((x.0, y.1))),
        CompareGreater => (
            Some((ty.next_up(y.0), x.1)),
            Some((y.0, ty.next_down(x.1))),
        ),
        CompareGreaterOrEqual => (Some((y.0, x.1)), Some((y.0, x.1))),
        _ => {
            let common = (x.0.max(y.0), x.1.min(y.1));
            (Some(common), Some(common))
        }
    }
}

/// Comparisons; NaN makes every ordered comparison false and `!=` true
fn constrain_compare(
    op: &Operation,
    first: &ScalarElement,
    second: &ScalarElement,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let outcome = match result {
        ScalarElement::Bit(bit) => bit.value(),
        _ => return settle(ctx, first, Some(second), (Bound::Keep, Bound::Keep), true),
    };
    let ty = float_type(first);
    let (a, b) = (set_of(first), set_of(second));
    let kind = op.kind();

    // the outcome that requires both operands ordered
    let ordered = match (kind, outcome) {
        (OperationKind::CompareDifferent, false) => Some(OperationKind::CompareEqual),
        (OperationKind::CompareDifferent, true) => None,
        (kind, true) => Some(kind),
        (kind, false) => {
            if a.may_be_nan() || b.may_be_nan() {
                None
            } else {
                Some(kind.negate())
            }
        }
    };
    let kind = match ordered {
        Some(kind) => kind,
        None => {
            // NaN on either side already explains the outcome
            let exact = a.may_be_nan() && b.may_be_nan();
            return settle(ctx, first, Some(second), (Bound::Keep, Bound::Keep), exact);
        }
    };
    match (a.bounds(), b.bounds()) {
        (Some(x), Some(y)) => {
            let (xs, ys) = relate(&ty, kind, x, y);
            settle(ctx, first, Some(second), (bound(xs, false), bound(ys, false)), true)
        }
        _ => settle(
            ctx,
            first,
            Some(second),
            (bound(None, false), bound(None, false)),
            true,
        ),
    }
}

/// Bounds of a rounded sum or difference, widened by one step of the type
fn widened(ty: &FloatType, lo: f64, hi: f64) -> (f64, f64) {
    let lo = if lo.is_nan() { NEG_INF } else { ty.next_down(lo) };
    let hi = if hi.is_nan() { INF } else { ty.next_up(hi) };
    (lo, hi)
}

/// `x + y` and `x - y`
fn constrain_additive(
    op: &Operation,
    first: &ScalarElement,
    second: &ScalarElement,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let ty = float_type(first);
    let z = set_of(result);
    if z.may_be_nan() {
        return settle(ctx, first, Some(second), (Bound::Keep, Bound::Keep), false);
    }
    let (x, y, t) = match (set_of(first).bounds(), set_of(second).bounds(), z.bounds()) {
        (Some(x), Some(y), Some(t)) => (x, y, t),
        _ => return settle(ctx, first, Some(second), (bound(None, false), Bound::Keep), true),
    };
    // the unrounded result lies strictly between the neighbors of the result bounds
    let s = widened(&ty, t.0, t.1);
    let (xs, ys) = match op {
        Operation::Plus => (
            widened(&ty, s.0 - y.1, s.1 - y.0),
            widened(&ty, s.0 - x.1, s.1 - x.0),
        ),
        _ => (
            widened(&ty, s.0 + y.0, s.1 + y.1),
            widened(&ty, x.0 - s.1, x.1 - s.0),
        ),
    };
    settle(
        ctx,
        first,
        Some(second),
        (bound(Some(xs), false), bound(Some(ys), false)),
        false,
    )
}

/// `min(x, y)` and `max(x, y)` on operands without NaN
fn constrain_extremum_op(
    op: &Operation,
    first: &ScalarElement,
    second: &ScalarElement,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let (a, b, c) = (set_of(first), set_of(second), set_of(result));
    let ranges = match (a.bounds(), b.bounds(), c.bounds()) {
        (Some(x), Some(y), Some(z)) if !a.may_be_nan() && !b.may_be_nan() => Some((x, y, z)),
        _ => None,
    };
    let (x, y, z) = match ranges {
        Some(ranges) => ranges,
        None => return settle(ctx, first, Some(second), (Bound::Keep, Bound::Keep), false),
    };
    let extremum = match op {
        Operation::Min => Extremum::Min,
        _ => Extremum::Max,
    };
    let bounds = |(lo, hi): (f64, f64)| Bounds::new(lo, hi);
    let narrowed = constrain_extremum(&FLOAT_TRAITS, extremum, &bounds(x), &bounds(y), &bounds(z));
    let (xs, ys) = match narrowed {
        Some((xs, ys)) => (Some((xs.lo, xs.hi)), Some((ys.lo, ys.hi))),
        None => (None, None),
    };
    settle(ctx, first, Some(second), (bound(xs, false), bound(ys, false)), false)
}

/// `-x`
fn constrain_opposite(
    first: &ScalarElement,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let z = set_of(result);
    let range = z.bounds().map(|(lo, hi)| (-hi, -lo));
    settle(ctx, first, None, (bound(range, z.may_be_nan()), Bound::Keep), true)
}

/// The neighbor steps
fn constrain_step(
    op: &Operation,
    first: &ScalarElement,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let ty = float_type(first);
    let z = set_of(result);
    let range = z.bounds().map(|(lo, hi)| match op {
        Operation::Next => (ty.next_down(lo), hi),
        _ => (lo, ty.next_up(hi)),
    });
    settle(ctx, first, None, (bound(range, z.may_be_nan()), Bound::Keep), false)
}

/// Conversion between float types
fn constrain_cast_float(
    first: &ScalarElement,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let (from, to) = (float_type(first), float_type(result));
    let z = set_of(result);
    let widening = to.width() >= from.width();
    let range = z.bounds().map(|(lo, hi)| {
        if widening {
            (lo, hi)
        } else {
            (to.next_down(lo), to.next_up(hi))
        }
    });
    settle(ctx, first, None, (bound(range, z.may_be_nan()), Bound::Keep), widening)
}

/// Truncation into an integer type
///
/// Only stopping on errors rules out NaN and the out-of-range values; otherwise both reach
/// every integer.
fn constrain_cast_int(
    first: &ScalarElement,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    if !ctx.stops_on_error() {
        return settle(ctx, first, None, (Bound::Keep, Bound::Keep), false);
    }
    let ty = float_type(first);
    let (_, lo, hi) = match result.int_bounds() {
        Some(bounds) => bounds,
        None => invariant_violation(format!("truncation into {}", result)),
    };
    // trunc(x) in [lo, hi] iff lo <= x (lo > 0) or lo - 1 < x, and symmetrically above
    let lower = if lo.is_positive() {
        ty.round(to_f64(&lo))
    } else {
        let below = lo - BigInt::from(1);
        let (value, exact) = converted(&ty, &below);
        if exact {
            ty.next_up(value)
        } else {
            value
        }
    };
    let upper = if hi.is_negative() {
        ty.round(to_f64(&hi))
    } else {
        let above = hi + BigInt::from(1);
        let (value, exact) = converted(&ty, &above);
        if exact {
            ty.next_down(value)
        } else {
            value
        }
    };
    settle(ctx, first, None, (bound(Some((lower, upper)), false), Bound::Keep), false)
}

/// An integer as a float of `ty`, with whether no rounding happened
fn converted(ty: &FloatType, value: &BigInt) -> (f64, bool) {
    let float = ty.round(to_f64(value));
    (float, BigInt::from_f64(float).as_ref() == Some(value))
}

/// Products, quotients and remainders: only NaN can be ruled out
fn constrain_nan_only(
    first: &ScalarElement,
    second: &ScalarElement,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    if set_of(result).may_be_nan() {
        return settle(ctx, first, Some(second), (Bound::Keep, Bound::Keep), false);
    }
    let everything = || bound(Some((NEG_INF, INF)), false);
    settle(ctx, first, Some(second), (everything(), everything()), false)
}

/// Backward refinement of every float operation
pub(crate) fn constrain(
    receiver: &ScalarElement,
    op: &Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    use OperationKind::*;

    let (first, second) = ctx.operands(receiver);
    trace!("float refinement of {} through {}", first, op);
    match op.kind() {
        LogicalNegate | CastBit => logical::constrain_zero_test(receiver, op, result, ctx),
        LogicalAnd | LogicalOr => logical::constrain_connective(receiver, op, result, ctx),
        Opposite => constrain_opposite(first, result, ctx),
        Prev | Next => constrain_step(op, first, result, ctx),
        CastFloat => constrain_cast_float(first, result, ctx),
        CastInt => constrain_cast_int(first, result, ctx),
        kind if kind.is_compare() => {
            constrain_compare(op, first, operand(second, op), result, ctx)
        }
        Plus | Minus => constrain_additive(op, first, operand(second, op), result, ctx),
        Min | Max => constrain_extremum_op(op, first, operand(second, op), result, ctx),
        Times | Divide | Modulo => {
            constrain_nan_only(first, operand(second, op), result, ctx)
        }
        _ => invariant_violation(format!("{} refined on a float", op)),
    }
}
