use num_bigint::BigInt;
use num_traits::Zero;

use crate::analysis::context::{Argument, ConstraintContext};
use crate::analysis::element::ScalarElement;
use crate::analysis::float::FloatSet;
use crate::ir::operation::Operation;
use crate::ir::typing::ScalarType;

/// The zero values of an element, `None` when it has none
pub(crate) fn zero_part(element: &ScalarElement) -> Option<ScalarElement> {
    match element.scalar_type() {
        ScalarType::Float(ty) => {
            if element.is_constant() {
                return element.compare_special().is_zero().then(|| element.clone());
            }
            let set = element.float_set()?;
            if !set.contains(0.0) {
                return None;
            }
            // a range holding zero holds both of its signs
            ScalarElement::from_float_set(ty, &FloatSet::range(-0.0, 0.0))
        }
        ty => {
            let zero = BigInt::zero();
            element
                .contains_int(&zero)
                .then(|| ScalarElement::int_constant_of(ty, zero))
        }
    }
}

/// The nonzero values of an element with whether they are exactly represented,
/// `None` when it has none
pub(crate) fn nonzero_part(element: &ScalarElement) -> Option<(ScalarElement, bool)> {
    if element.compare_special().is_nonzero() {
        return Some((element.clone(), true));
    }
    match element.scalar_type() {
        ScalarType::Float(ty) => {
            let set = element.float_set()?;
            let range = set.bounds().and_then(|(lo, hi)| {
                let lo = if lo == 0.0 { ty.next_up(0.0) } else { lo };
                let hi = if hi == 0.0 { ty.next_down(0.0) } else { hi };
                (lo <= hi).then(|| (lo, hi))
            });
            let exact = range.map_or(true, |(lo, hi)| !(lo < 0.0 && 0.0 < hi));
            let set = match range {
                Some((lo, hi)) => FloatSet::range(lo, hi).with_nan(set.may_be_nan()),
                None => FloatSet::empty().with_nan(set.may_be_nan()),
            };
            ScalarElement::from_float_set(ty, &set).map(|part| (part, exact))
        }
        ty => {
            if let Some(values) = element.int_values() {
                let kept: Vec<BigInt> = values.into_iter().filter(|v| !v.is_zero()).collect();
                if kept.is_empty() {
                    return None;
                }
                return Some((ScalarElement::from_int_values(ty, kept), true));
            }
            let (_, mut lo, mut hi) = element.int_bounds()?;
            if lo.is_zero() {
                lo += 1;
            } else if hi.is_zero() {
                hi -= 1;
            }
            if lo > hi {
                return None;
            }
            let exact = !(lo < BigInt::zero() && hi > BigInt::zero());
            Some((ScalarElement::from_int_range(ty, lo, hi), exact))
        }
    }
}

/// Restrict an operand to its zero or nonzero values; false when nothing is left
fn restrict(
    ctx: &mut ConstraintContext<'_>,
    slot: Argument,
    element: &ScalarElement,
    zero: bool,
) -> Option<bool> {
    let (part, exact) = if zero {
        (zero_part(element)?, true)
    } else {
        nonzero_part(element)?
    };
    if &part != element {
        ctx.refine(slot, part);
    }
    Some(exact)
}

fn truth_of(result: &ScalarElement) -> Option<bool> {
    match result {
        ScalarElement::Bit(_) => result.int_constant().map(|value| !value.is_zero()),
        _ => None,
    }
}

/// `!x` and the cast to a bit
pub(crate) fn constrain_zero_test(
    receiver: &ScalarElement,
    op: &Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let truth = match truth_of(result) {
        Some(truth) => truth,
        None => {
            ctx.merge_verdict_exact();
            return true;
        }
    };
    let (first, _) = ctx.operands(receiver);
    let zero = matches!(op, Operation::LogicalNegate) == truth;
    match restrict(ctx, Argument::First, first, zero) {
        Some(exact) => ctx.merge_verdict(exact),
        None => {
            ctx.set_empty();
            ctx.merge_verdict_exact();
        }
    }
    true
}

/// `x && y` and `x || y`
///
/// A conjunction that holds makes both operands nonzero; a disjunction that fails makes both
/// zero. The other two outcomes only decide one operand once the other is known.
pub(crate) fn constrain_connective(
    receiver: &ScalarElement,
    op: &Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let (first, second) = ctx.operands(receiver);
    let (truth, second) = match (truth_of(result), second) {
        (Some(truth), Some(second)) => (truth, second),
        _ => {
            ctx.merge_verdict_exact();
            return true;
        }
    };
    let conjunction = matches!(op, Operation::LogicalAnd);

    // the value both operands must share for the outcome to be decided by both
    let both_zero = match (conjunction, truth) {
        (true, true) => Some(false),
        (false, false) => Some(true),
        _ => None,
    };
    let verdict = match both_zero {
        Some(zero) => restrict(ctx, Argument::First, first, zero).and_then(|lhs| {
            restrict(ctx, Argument::Second, second, zero).map(|rhs| lhs && rhs)
        }),
        None => {
            // the outcome requires one operand to be zero (conjunction) or nonzero
            let wanted_zero = conjunction;
            let settles = |element: &ScalarElement| {
                let special = element.compare_special();
                if wanted_zero {
                    special.is_zero()
                } else {
                    special.is_nonzero()
                }
            };
            let misses = |element: &ScalarElement| {
                let special = element.compare_special();
                if wanted_zero {
                    special.is_nonzero()
                } else {
                    special.is_zero()
                }
            };
            if settles(first) || settles(second) {
                Some(true)
            } else if misses(first) {
                restrict(ctx, Argument::Second, second, wanted_zero)
            } else if misses(second) {
                restrict(ctx, Argument::First, first, wanted_zero)
            } else {
                Some(false)
            }
        }
    };
    match verdict {
        Some(exact) => ctx.merge_verdict(exact),
        None => {
            ctx.set_empty();
            ctx.merge_verdict_exact();
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::params::EXACT_STOP;
    use crate::ir::typing::{FloatType, IntType};

    fn i8t() -> IntType {
        IntType::signed(8).unwrap()
    }

    fn range(lo: i64, hi: i64) -> ScalarElement {
        ScalarElement::int_range(i8t(), lo, hi).unwrap()
    }

    #[test]
    fn zero_and_nonzero_parts() {
        assert_eq!(zero_part(&range(-3, 3)), Some(ScalarElement::int(i8t(), 0).unwrap()));
        assert_eq!(zero_part(&range(1, 3)), None);
        assert_eq!(nonzero_part(&range(0, 3)), Some((range(1, 3), true)));
        assert_eq!(nonzero_part(&range(-3, 3)), Some((range(-3, 3), false)));

        let zeros = ScalarElement::float_range(FloatType::DOUBLE, 0.0, 2.0).unwrap();
        let part = zero_part(&zeros).unwrap();
        assert!(part.contains(&ScalarElement::float(FloatType::DOUBLE, -0.0)));
        let (part, exact) = nonzero_part(&zeros).unwrap();
        assert!(exact);
        assert!(!part.contains(&ScalarElement::float(FloatType::DOUBLE, 0.0)));
    }

    #[test]
    fn negation_splits_on_zero() {
        let x = range(0, 9);
        let mut ctx = ConstraintContext::new(&EXACT_STOP);
        assert!(x.constraint(&Operation::LogicalNegate, &ScalarElement::bit(true), &mut ctx));
        assert_eq!(ctx.first(), Some(&ScalarElement::int(i8t(), 0).unwrap()));

        let mut ctx = ConstraintContext::new(&EXACT_STOP);
        assert!(x.constraint(&Operation::CastBit, &ScalarElement::bit(true), &mut ctx));
        assert_eq!(ctx.first(), Some(&range(1, 9)));
        assert!(ctx.is_exact());

        let y = range(1, 9);
        let mut ctx = ConstraintContext::new(&EXACT_STOP);
        assert!(y.constraint(&Operation::LogicalNegate, &ScalarElement::bit(true), &mut ctx));
        assert!(ctx.is_empty());
    }

    #[test]
    fn connectives() {
        let (x, y) = (range(0, 5), range(0, 5));
        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&y);
        assert!(x.constraint(&Operation::LogicalAnd, &ScalarElement::bit(true), &mut ctx));
        assert_eq!(ctx.first(), Some(&range(1, 5)));
        assert_eq!(ctx.second(), Some(&range(1, 5)));

        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&y);
        assert!(x.constraint(&Operation::LogicalOr, &ScalarElement::bit(false), &mut ctx));
        assert_eq!(ctx.first(), Some(&ScalarElement::int(i8t(), 0).unwrap()));

        // one side known nonzero hands the outcome to the other
        let sure = range(2, 5);
        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&sure);
        assert!(x.constraint(&Operation::LogicalAnd, &ScalarElement::bit(false), &mut ctx));
        assert_eq!(ctx.first(), Some(&ScalarElement::int(i8t(), 0).unwrap()));
        assert_eq!(ctx.second(), None);

        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&y);
        assert!(x.constraint(&Operation::LogicalAnd, &ScalarElement::bit(false), &mut ctx));
        assert_eq!(ctx.first(), None);
        assert!(!ctx.is_exact());
    }
}
