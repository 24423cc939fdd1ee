use lazy_static::lazy_static;
use num_bigint::BigInt;

use libra_shared::config::DISJUNCTION_LIMIT;

use crate::analysis::constant::{compare_values, fold_int};
use crate::analysis::context::{Argument, ConstraintContext, EvalContext};
use crate::analysis::disjunction;
use crate::analysis::dispatch::{
    result_type_of, ApplyHandler, ConstraintHandler, Handler, MethodTable, QueryTable,
};
use crate::analysis::element::ScalarElement;
use crate::analysis::generic::{AbstractDomain, Meet};
use crate::analysis::lattice::PrecisionKind;
use crate::analysis::propagate;
use crate::analysis::query::{self, QueryAnswer, QueryFamily};
use crate::analysis::range::produce_int;
use crate::analysis::sign::CompareSpecial;
use crate::error::{invariant_violation, EngineResult};
use crate::ir::operation::{Operation, OperationKind, BINARY_START, COMPARE_START, UNARY_COUNT};
use crate::ir::typing::ScalarType;

/// A known boolean
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BitConstant {
    value: bool,
}

impl BitConstant {
    pub fn new(value: bool) -> Self {
        Self { value }
    }

    pub fn value(&self) -> bool {
        self.value
    }

    fn as_int(&self) -> BigInt {
        BigInt::from(self.value as u8)
    }

    fn apply_fold(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let argument = match ctx.argument() {
            None => None,
            Some(argument) => match argument.int_constant() {
                None => return false,
                Some(value) => Some((argument.scalar_type(), value)),
            },
        };
        fold_int(
            ctx,
            op,
            ScalarType::Bit,
            &self.as_int(),
            argument.as_ref().map(|(ty, value)| (*ty, value)),
        )
    }

    /// Fold against every value of a non-constant operand
    ///
    /// Operands with too many values to enumerate leave an unknown result.
    fn apply_enumerated(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let argument = match ctx.argument() {
            None => return false,
            Some(argument) => argument,
        };
        let values = match argument.int_values() {
            Some(values) => values,
            None => match argument.int_bounds() {
                None => return false,
                Some((_, lo, hi)) if &hi - &lo < BigInt::from(*DISJUNCTION_LIMIT) => {
                    let mut values = vec![];
                    let mut value = lo;
                    while value <= hi {
                        values.push(value.clone());
                        value += 1;
                    }
                    values
                }
                Some(_) => return self.apply_unknown(op, ctx),
            },
        };
        let ty = argument.scalar_type();
        let members: Vec<ScalarElement> = values
            .into_iter()
            .map(|value| ScalarElement::int_constant_of(ty, value))
            .collect();
        disjunction::apply_with_arguments(&ScalarElement::Bit(*self), &members, op, ctx)
    }

    fn apply_unknown(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let ty = result_type_of(ScalarType::Bit, op, ctx);
        if matches!(op.kind(), OperationKind::LeftShift | OperationKind::RightShift) {
            ctx.set_positive_overflow();
        }
        let int = ty
            .bits_view()
            .unwrap_or_else(|| invariant_violation(format!("bit operation into {}", ty)));
        produce_int(ctx, ty, int.min_value(), int.max_value(), false)
    }
}

/// Values of a bit-typed operand, `None` for operands of other types
fn bit_values(element: &ScalarElement) -> Option<Vec<bool>> {
    match element {
        ScalarElement::Bit(bit) => Some(vec![bit.value]),
        _ if element.scalar_type() == ScalarType::Bit && element.is_top() => Some(vec![false, true]),
        _ => None,
    }
}

/// Pin an unknown bit operand when every surviving pair agrees on it
fn settle(
    ctx: &mut ConstraintContext<'_>,
    slot: Argument,
    element: &ScalarElement,
    mut values: impl Iterator<Item = bool>,
) {
    if let Some(head) = values.next() {
        if element.is_top() && values.all(|value| value == head) {
            ctx.refine(slot, ScalarElement::bit(head));
        }
    }
}

/// Keep the operand values of the pairs whose outcome is `result`
///
/// Both operands are bits, so the surviving pairs describe the refinement exactly.
fn constrain_by_truth_table(
    receiver: &ScalarElement,
    op: &Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
    outcome: fn(OperationKind, bool, bool) -> bool,
) -> bool {
    let wanted = match result {
        ScalarElement::Bit(bit) => bit.value,
        _ => {
            ctx.merge_verdict_exact();
            return true;
        }
    };
    let (first, second) = ctx.operands(receiver);
    let (second, xs, ys) = match (second, bit_values(first), second.and_then(bit_values)) {
        (Some(second), Some(xs), Some(ys)) => (second, xs, ys),
        _ => return propagate::constrain_by_enumeration(receiver, op, result, ctx),
    };
    let kind = op.kind();
    let pairs: Vec<(bool, bool)> = xs
        .iter()
        .flat_map(|x| ys.iter().map(move |y| (*x, *y)))
        .filter(|(x, y)| outcome(kind, *x, *y) == wanted)
        .collect();
    if pairs.is_empty() {
        ctx.set_empty();
    } else {
        settle(ctx, Argument::First, first, pairs.iter().map(|(x, _)| *x));
        settle(ctx, Argument::Second, second, pairs.iter().map(|(_, y)| *y));
    }
    ctx.merge_verdict_exact();
    true
}

fn compare_bits(kind: OperationKind, x: bool, y: bool) -> bool {
    compare_values(kind, &x, &y)
}

fn connect_bits(kind: OperationKind, x: bool, y: bool) -> bool {
    match kind {
        OperationKind::LogicalAnd => x && y,
        _ => x || y,
    }
}

impl BitConstant {
    /// An equality that holds pins the other operand to this bit, a difference to its negation
    fn constrain_compare(
        &self,
        op: &Operation,
        result: &ScalarElement,
        ctx: &mut ConstraintContext<'_>,
    ) -> bool {
        constrain_by_truth_table(&ScalarElement::Bit(*self), op, result, ctx, compare_bits)
    }

    /// A conjunction that holds forces both operands, as does a disjunction that fails
    fn constrain_connective(
        &self,
        op: &Operation,
        result: &ScalarElement,
        ctx: &mut ConstraintContext<'_>,
    ) -> bool {
        constrain_by_truth_table(&ScalarElement::Bit(*self), op, result, ctx, connect_bits)
    }
}

impl AbstractDomain for BitConstant {
    const PRECISION: PrecisionKind = PrecisionKind::Constant;

    fn scalar_type(&self) -> ScalarType {
        ScalarType::Bit
    }

    fn merge(&self, other: &ScalarElement) -> Option<ScalarElement> {
        match other {
            ScalarElement::Bit(o) if o.value == self.value => Some(other.clone()),
            ScalarElement::Bit(_) => Some(ScalarElement::top(ScalarType::Bit)),
            _ => None,
        }
    }

    fn intersect(&self, other: &ScalarElement) -> Option<Meet> {
        match other {
            ScalarElement::Bit(o) if o.value == self.value => Some(Meet::Element(other.clone())),
            ScalarElement::Bit(_) => Some(Meet::Bottom),
            _ => None,
        }
    }

    fn contain(&self, other: &ScalarElement) -> Option<bool> {
        match other {
            ScalarElement::Bit(o) => Some(o.value == self.value),
            _ => None,
        }
    }

    fn contain_to(&self, source: &ScalarElement) -> Option<bool> {
        self.contain(source)
    }

    fn compare_special(&self) -> CompareSpecial {
        CompareSpecial::of_bit(self.value)
    }
}

fn query_compare_special(element: &ScalarElement, _: &query::Query) -> EngineResult<QueryAnswer> {
    Ok(QueryAnswer::CompareSpecial(element.compare_special()))
}

/// A bit is already in its simplest form
fn query_simplification(element: &ScalarElement, _: &query::Query) -> EngineResult<QueryAnswer> {
    Ok(QueryAnswer::Element(element.clone()))
}

fn build_apply_table() -> MethodTable<ApplyHandler<BitConstant>> {
    let mut table: MethodTable<ApplyHandler<BitConstant>> = MethodTable::new();
    table
        .bind_all(
            &OperationKind::ALL[..UNARY_COUNT],
            Handler::Bound(BitConstant::apply_fold),
        )
        .bind_all(
            &OperationKind::ALL[COMPARE_START..],
            Handler::Specialized {
                constant: BitConstant::apply_fold,
                general: BitConstant::apply_enumerated,
            },
        );
    table
}

fn build_constraint_table() -> MethodTable<ConstraintHandler<BitConstant>> {
    use OperationKind::*;

    let mut table: MethodTable<ConstraintHandler<BitConstant>> = propagate::enumeration_table();
    table
        .bind_all(
            &OperationKind::ALL[COMPARE_START..BINARY_START],
            Handler::Bound(BitConstant::constrain_compare),
        )
        .bind_all(&[LogicalAnd, LogicalOr], Handler::Bound(BitConstant::constrain_connective));
    table
}

fn build_query_table() -> QueryTable {
    let mut table = query::integer_table();
    table
        .bind(QueryFamily::Special, 0, query_compare_special)
        .bind(QueryFamily::Special, 1, query_simplification);
    table
}

lazy_static! {
    pub static ref APPLY: MethodTable<ApplyHandler<BitConstant>> = build_apply_table();
    pub static ref CONSTRAINT: MethodTable<ConstraintHandler<BitConstant>> =
        build_constraint_table();
    pub static ref QUERY: QueryTable = build_query_table();
}
