//
// Backward refinement of operands
//
// Every solver follows the same steps: invert the operation algebraically where the inverse
// is total, split into sign or wrap cases where it is not, join the per-case bounds, and
// leave operands untouched (degraded) when no case decides.
//

use log::trace;
use num_bigint::BigInt;
use num_traits::Signed;

use libra_shared::config::DISJUNCTION_LIMIT;

use crate::analysis::context::{Argument, ConstraintContext};
use crate::analysis::dispatch::{ConstraintHandler, Handler, MethodTable};
use crate::analysis::element::ScalarElement;
use crate::analysis::generic::Meet;
use crate::analysis::numeric::hull;
use crate::error::invariant_violation;
use crate::ir::operation::{OperationKind, BINARY_START, COMPARE_START};
use crate::ir::typing::IntType;

pub mod arith;
pub mod bitrange;
pub mod bitwise;
pub mod compare;
pub mod division;
pub mod floating;
pub mod logical;

/// Integer bounds of one operand, in its own type
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Span {
    pub ty: IntType,
    pub lo: BigInt,
    pub hi: BigInt,
}

impl Span {
    pub fn of(element: &ScalarElement) -> Option<Self> {
        let (ty, lo, hi) = element.int_bounds()?;
        Some(Self { ty, lo, hi })
    }

    pub fn bounds(&self) -> (BigInt, BigInt) {
        (self.lo.clone(), self.hi.clone())
    }

    pub fn value(&self) -> Option<&BigInt> {
        if self.lo == self.hi {
            Some(&self.lo)
        } else {
            None
        }
    }

    pub fn contains(&self, value: &BigInt) -> bool {
        &self.lo <= value && value <= &self.hi
    }

    pub fn has_zero(&self) -> bool {
        !self.lo.is_positive() && !self.hi.is_negative()
    }

    pub fn is_natural(&self) -> bool {
        !self.lo.is_negative()
    }
}

/// The parts of a range without zero: negative first, then positive
pub(crate) fn nonzero_parts(range: &(BigInt, BigInt)) -> Vec<(BigInt, BigInt)> {
    let (lo, hi) = range;
    let mut parts = vec![];
    if lo.is_negative() {
        parts.push((lo.clone(), hi.clone().min(BigInt::from(-1))));
    }
    if hi.is_positive() {
        parts.push((lo.clone().max(BigInt::from(1)), hi.clone()));
    }
    parts
}

/// What a solver found out about the operands
#[derive(Debug)]
pub(crate) enum Narrowing {
    /// no pair of operand values produces the result
    Impossible,
    Bounds {
        first: Option<(BigInt, BigInt)>,
        second: Option<(BigInt, BigInt)>,
        exact: bool,
    },
}

impl Narrowing {
    /// Nothing could be decided
    pub fn unknown() -> Self {
        Self::Bounds {
            first: None,
            second: None,
            exact: false,
        }
    }

    /// Every operand value can produce the result
    pub fn unchanged() -> Self {
        Self::Bounds {
            first: None,
            second: None,
            exact: true,
        }
    }

    pub fn first(range: (BigInt, BigInt), exact: bool) -> Self {
        Self::Bounds {
            first: Some(range),
            second: None,
            exact,
        }
    }

    pub fn both(first: (BigInt, BigInt), second: (BigInt, BigInt), exact: bool) -> Self {
        Self::Bounds {
            first: Some(first),
            second: Some(second),
            exact,
        }
    }

    /// Join per-case bounds of the first operand; no case at all is impossible
    pub fn from_pieces(pieces: &[(BigInt, BigInt)], exact: bool) -> Self {
        match hull(pieces) {
            None => Self::Impossible,
            Some(range) => Self::first(range, exact && pieces.len() == 1),
        }
    }

    /// Join per-case bounds of both operands, the cases being paired
    pub fn from_pairs(pairs: &[((BigInt, BigInt), (BigInt, BigInt))], exact: bool) -> Self {
        let firsts: Vec<_> = pairs.iter().map(|(first, _)| first.clone()).collect();
        let seconds: Vec<_> = pairs.iter().map(|(_, second)| second.clone()).collect();
        match (hull(&firsts), hull(&seconds)) {
            (Some(first), Some(second)) => Self::both(first, second, exact && pairs.len() == 1),
            _ => Self::Impossible,
        }
    }
}

/// Integer view of the operands and the result of a backward step
pub(crate) struct Frame<'r> {
    pub first: &'r ScalarElement,
    pub second: Option<&'r ScalarElement>,
    pub x: Span,
    pub y: Option<Span>,
    pub z: Span,
    /// the result bounds are exactly its values
    convex: bool,
}

impl<'r> Frame<'r> {
    /// `None` when an operand is not a convex integer element
    pub fn of<'a: 'r>(
        receiver: &'r ScalarElement,
        result: &ScalarElement,
        ctx: &ConstraintContext<'a>,
    ) -> Option<Self> {
        let (first, second) = ctx.operands(receiver);
        let convex = |element: &ScalarElement| !matches!(element, ScalarElement::Disjunction(_));
        if !convex(first) || !second.map_or(true, convex) {
            return None;
        }
        let y = match second {
            None => None,
            Some(second) => Some(Span::of(second)?),
        };
        Some(Self {
            first,
            second,
            x: Span::of(first)?,
            y,
            z: Span::of(result)?,
            convex: convex(result),
        })
    }

    /// The second operand of a binary operation
    pub fn y(&self) -> &Span {
        self.y
            .as_ref()
            .unwrap_or_else(|| invariant_violation("binary refinement without its second operand"))
    }

    /// Write the narrowed operands back into the context
    pub fn commit(&self, ctx: &mut ConstraintContext<'_>, narrowing: Narrowing) -> bool {
        match narrowing {
            Narrowing::Impossible => {
                ctx.set_empty();
                ctx.merge_verdict_exact();
            }
            Narrowing::Bounds {
                first,
                second,
                exact,
            } => {
                let mut alive = true;
                if let Some((lo, hi)) = first {
                    alive &= narrow(ctx, Argument::First, self.first, lo, hi);
                }
                if let (Some(element), Some((lo, hi))) = (self.second, second) {
                    alive &= narrow(ctx, Argument::Second, element, lo, hi);
                }
                if alive {
                    ctx.merge_verdict(exact && self.convex);
                } else {
                    ctx.set_empty();
                    ctx.merge_verdict_exact();
                }
            }
        }
        true
    }
}

/// Meet an integer operand with `[lo, hi]`; false when nothing is left
pub(crate) fn narrow(
    ctx: &mut ConstraintContext<'_>,
    slot: Argument,
    element: &ScalarElement,
    lo: BigInt,
    hi: BigInt,
) -> bool {
    let ty = match element.int_bounds() {
        Some((ty, _, _)) => ty,
        None => invariant_violation(format!("integer narrowing of {}", element)),
    };
    let (lo, hi) = (lo.max(ty.min_value()), hi.min(ty.max_value()));
    if lo > hi {
        return false;
    }
    let bound = ScalarElement::from_int_range(element.scalar_type(), lo, hi);
    refine_with(ctx, slot, element, &bound)
}

/// Meet an operand with `bound`; false when nothing is left
pub(crate) fn refine_with(
    ctx: &mut ConstraintContext<'_>,
    slot: Argument,
    element: &ScalarElement,
    bound: &ScalarElement,
) -> bool {
    match element.meet(bound) {
        Meet::Bottom => false,
        Meet::Element(refined) => {
            if &refined != element {
                ctx.refine(slot, refined);
            }
            true
        }
    }
}

//
// Tables
//

/// Backward handlers of integer elements
pub fn integer_table<E>() -> MethodTable<ConstraintHandler<E>> {
    use OperationKind::*;

    let mut table: MethodTable<ConstraintHandler<E>> = MethodTable::new();
    table
        .bind_all(&[Prev, Next, Opposite], Handler::Generic(arith::constrain_step))
        .bind(BitNegate, Handler::Generic(bitwise::constrain_negate))
        .bind_all(&[LogicalNegate, CastBit], Handler::Generic(logical::constrain_zero_test))
        .bind(CastInt, Handler::Generic(bitrange::constrain_cast_int))
        .bind(CastFloat, Handler::Generic(bitrange::constrain_cast_float))
        .bind_all(&[ExtendWithZero, ExtendWithSign], Handler::Generic(bitrange::constrain_extend))
        .bind(Reduce, Handler::Generic(bitrange::constrain_reduce))
        .bind_all(
            &OperationKind::ALL[COMPARE_START..BINARY_START],
            Handler::Generic(compare::constrain_compare),
        )
        .bind_all(&[Plus, Minus], Handler::Generic(arith::constrain_additive))
        .bind(Times, Handler::Generic(arith::constrain_times))
        .bind(Divide, Handler::Generic(division::constrain_divide))
        .bind(Modulo, Handler::Generic(division::constrain_modulo))
        .bind_all(&[Min, Max], Handler::Generic(compare::constrain_min_max))
        .bind_all(&[BitAnd, BitOr, BitXor], Handler::Generic(bitwise::constrain_bitwise))
        .bind_all(&[LeftShift, RightShift], Handler::Generic(bitwise::constrain_shift))
        .bind_all(&[LeftRotate, RightRotate], Handler::Generic(bitwise::constrain_rotate))
        .bind_all(&[LogicalAnd, LogicalOr], Handler::Generic(logical::constrain_connective))
        .bind(Concat, Handler::Generic(bitrange::constrain_concat))
        .bind(BitSet, Handler::Generic(bitrange::constrain_bit_set));
    table
}

/// Backward handlers that enumerate the operand values
pub fn enumeration_table<E>() -> MethodTable<ConstraintHandler<E>> {
    let mut table: MethodTable<ConstraintHandler<E>> = MethodTable::new();
    table.bind_all(&OperationKind::ALL, Handler::Generic(constrain_by_enumeration));
    table
}

/// Values of an operand small enough to try one by one
fn enumerate(element: &ScalarElement) -> Option<Vec<ScalarElement>> {
    if let Some(members) = element.members() {
        return Some(members);
    }
    let (_, lo, hi) = element.int_bounds()?;
    if &hi - &lo >= BigInt::from(*DISJUNCTION_LIMIT) {
        return None;
    }
    let ty = element.scalar_type();
    let mut members = vec![];
    let mut value = lo;
    while value <= hi {
        members.push(ScalarElement::int_constant_of(ty, value.clone()));
        value += 1;
    }
    Some(members)
}

fn join_all(members: &[ScalarElement]) -> Option<(ScalarElement, bool)> {
    let (head, tail) = members.split_first()?;
    let mut joined = head.clone();
    let mut exact = true;
    for member in tail {
        let next = joined.join(member);
        exact &= joined.is_exact_join(member, &next);
        joined = next;
    }
    Some((joined, exact))
}

/// Refine by running the operation forward on every pair of operand values
///
/// Pairs whose outcome misses the result are dropped; an outcome that could not be computed
/// keeps its pair.
pub(crate) fn constrain_by_enumeration(
    receiver: &ScalarElement,
    op: &crate::ir::operation::Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let (first, second) = ctx.operands(receiver);
    let firsts = match enumerate(first) {
        Some(members) => members,
        None => {
            ctx.merge_verdict_degradate();
            return true;
        }
    };
    let seconds = match second {
        None => vec![None],
        Some(second) => match enumerate(second) {
            Some(members) => members.into_iter().map(Some).collect(),
            None => {
                ctx.merge_verdict_degradate();
                return true;
            }
        },
    };

    let mut kept_first = vec![];
    let mut kept_second = vec![];
    for x in &firsts {
        for y in &seconds {
            let mut trial = ctx.spawn(y.as_ref()).release();
            let feasible = if x.apply(op, &mut trial) {
                match trial.result() {
                    Some(outcome) => outcome.meet(result) != Meet::Bottom,
                    None => !trial.is_empty(),
                }
            } else {
                true
            };
            if feasible {
                if !kept_first.contains(x) {
                    kept_first.push(x.clone());
                }
                if let Some(y) = y {
                    if !kept_second.contains(y) {
                        kept_second.push(y.clone());
                    }
                }
            }
        }
    }
    trace!("{} of {} first operands survive {}", kept_first.len(), firsts.len(), op);

    let (refined_first, mut exact) = match join_all(&kept_first) {
        None => {
            ctx.set_empty();
            ctx.merge_verdict_exact();
            return true;
        }
        Some(joined) => joined,
    };
    let mut alive = refine_with(ctx, Argument::First, first, &refined_first);
    if let (Some(second), Some((refined_second, second_exact))) = (second, join_all(&kept_second)) {
        alive &= refine_with(ctx, Argument::Second, second, &refined_second);
        exact &= second_exact;
    }
    if alive {
        ctx.merge_verdict(exact);
    } else {
        ctx.set_empty();
        ctx.merge_verdict_exact();
    }
    true
}
