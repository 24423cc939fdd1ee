use num_bigint::BigInt;

use crate::analysis::context::ConstraintContext;
use crate::analysis::element::ScalarElement;
use crate::analysis::generic::{constrain_extremum, int_traits, Bounds, Extremum};
use crate::analysis::propagate::{Frame, Narrowing, Span};
use crate::error::invariant_violation;
use crate::ir::operation::{Operation, OperationKind};

/// Remove a constant from the end of a range it sits on
fn trim(own: &Span, value: &BigInt) -> ((BigInt, BigInt), bool) {
    let (mut lo, mut hi) = own.bounds();
    if &lo == value {
        lo += 1;
    } else if &hi == value {
        hi -= 1;
    }
    let exact = !(lo < *value && *value < hi);
    ((lo, hi), exact)
}

/// Operand ranges where `x kind y` holds
fn relate(kind: OperationKind, x: &Span, y: &Span) -> Narrowing {
    use OperationKind::*;

    match kind {
        CompareLess => Narrowing::both(
            (x.lo.clone(), &y.hi - 1),
            (&x.lo + 1, y.hi.clone()),
            true,
        ),
        CompareLessOrEqual => {
            Narrowing::both((x.lo.clone(), y.hi.clone()), (x.lo.clone(), y.hi.clone()), true)
        }
        CompareGreater => Narrowing::both(
            (&y.lo + 1, x.hi.clone()),
            (y.lo.clone(), &x.hi - 1),
            true,
        ),
        CompareGreaterOrEqual => {
            Narrowing::both((y.lo.clone(), x.hi.clone()), (y.lo.clone(), x.hi.clone()), true)
        }
        CompareEqual => {
            let common = (
                (&x.lo).max(&y.lo).clone(),
                (&x.hi).min(&y.hi).clone(),
            );
            Narrowing::both(common.clone(), common, true)
        }
        CompareDifferent => match (x.value(), y.value()) {
            (Some(a), Some(b)) if a == b => Narrowing::Impossible,
            (_, Some(c)) => {
                let (first, exact) = trim(x, c);
                Narrowing::Bounds {
                    first: Some(first),
                    second: None,
                    exact,
                }
            }
            (Some(c), None) => {
                let (second, exact) = trim(y, c);
                Narrowing::Bounds {
                    first: None,
                    second: Some(second),
                    exact,
                }
            }
            (None, None) => Narrowing::unchanged(),
        },
        _ => invariant_violation(format!("{} is not a comparison", kind)),
    }
}

/// Comparisons: a known outcome restricts both sides
pub(crate) fn constrain_compare(
    receiver: &ScalarElement,
    op: &Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let frame = match Frame::of(receiver, result, ctx) {
        Some(frame) => frame,
        None => return false,
    };
    let narrowing = match frame.z.value() {
        None => Narrowing::unchanged(),
        Some(outcome) if outcome == &BigInt::from(0) => {
            relate(op.kind().negate(), &frame.x, frame.y())
        }
        Some(_) => relate(op.kind(), &frame.x, frame.y()),
    };
    frame.commit(ctx, narrowing)
}

/// `min(x, y)` and `max(x, y)`
pub(crate) fn constrain_min_max(
    receiver: &ScalarElement,
    op: &Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let frame = match Frame::of(receiver, result, ctx) {
        Some(frame) => frame,
        None => return false,
    };
    let extremum = match op {
        Operation::Min => Extremum::Min,
        _ => Extremum::Max,
    };
    let bounds = |span: &Span| Bounds::new(span.lo.clone(), span.hi.clone());
    let narrowing = match constrain_extremum(
        int_traits(&frame.x.ty),
        extremum,
        &bounds(&frame.x),
        &bounds(frame.y()),
        &bounds(&frame.z),
    ) {
        None => Narrowing::Impossible,
        Some((a, b)) => Narrowing::both((a.lo, a.hi), (b.lo, b.hi), false),
    };
    frame.commit(ctx, narrowing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::params::EXACT_STOP;
    use crate::ir::typing::IntType;

    fn i8t() -> IntType {
        IntType::signed(8).unwrap()
    }

    fn range(lo: i64, hi: i64) -> ScalarElement {
        ScalarElement::int_range(i8t(), lo, hi).unwrap()
    }

    fn int(v: i64) -> ScalarElement {
        ScalarElement::int(i8t(), v).unwrap()
    }

    #[test]
    fn less_splits_overlapping_ranges() {
        let (x, y) = (range(0, 10), range(3, 5));
        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&y);
        assert!(x.constraint(&Operation::CompareLess, &ScalarElement::bit(true), &mut ctx));
        assert_eq!(ctx.first(), Some(&range(0, 4)));
        assert_eq!(ctx.second(), None);
        assert!(ctx.is_exact());

        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&y);
        assert!(x.constraint(&Operation::CompareLess, &ScalarElement::bit(false), &mut ctx));
        assert_eq!(ctx.first(), Some(&range(3, 10)));
    }

    #[test]
    fn equality_meets() {
        let (x, y) = (range(0, 10), range(8, 20));
        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&y);
        assert!(x.constraint(&Operation::CompareEqual, &ScalarElement::bit(true), &mut ctx));
        assert_eq!(ctx.first(), Some(&range(8, 10)));
        assert_eq!(ctx.second(), Some(&range(8, 10)));

        let (x, y) = (range(0, 3), range(8, 20));
        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&y);
        assert!(x.constraint(&Operation::CompareEqual, &ScalarElement::bit(true), &mut ctx));
        assert!(ctx.is_empty());
    }

    #[test]
    fn difference_trims_endpoints() {
        let (x, c) = (range(0, 10), int(0));
        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&c);
        assert!(x.constraint(&Operation::CompareDifferent, &ScalarElement::bit(true), &mut ctx));
        assert_eq!(ctx.first(), Some(&range(1, 10)));
        assert!(ctx.is_exact());

        let c = int(5);
        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&c);
        assert!(x.constraint(&Operation::CompareDifferent, &ScalarElement::bit(true), &mut ctx));
        assert_eq!(ctx.first(), None);
        assert!(!ctx.is_exact());
    }

    #[test]
    fn unknown_outcome_keeps_operands() {
        let (x, y) = (range(0, 10), range(3, 5));
        let any = ScalarElement::top(crate::ir::typing::ScalarType::Bit);
        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&y);
        assert!(x.constraint(&Operation::CompareLess, &any, &mut ctx));
        assert_eq!(ctx.first(), None);
        assert!(ctx.is_exact());
    }

    #[test]
    fn minimum_floors_both_operands() {
        let (x, y) = (range(0, 10), range(20, 30));
        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&y);
        assert!(x.constraint(&Operation::Min, &range(4, 6), &mut ctx));
        assert_eq!(ctx.first(), Some(&range(4, 6)));
        assert_eq!(ctx.second(), None);
    }
}
