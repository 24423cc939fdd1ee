use lazy_static::lazy_static;
use num_bigint::BigInt;
use num_traits::Zero;

use crate::analysis::context::{ErrorKind, EvalContext};
use crate::analysis::disjunction;
use crate::analysis::dispatch::{ApplyHandler, ConstraintHandler, Handler, MethodTable, QueryTable};
use crate::analysis::element::ScalarElement;
use crate::analysis::float;
use crate::analysis::generic::{AbstractDomain, Meet};
use crate::analysis::lattice::PrecisionKind;
use crate::analysis::numeric::{floor_div, low_mask, rotate_amount, rotate_left, shift_amount};
use crate::analysis::propagate;
use crate::analysis::query;
use crate::analysis::range::{produce_int, produce_overflowing};
use crate::analysis::sign::CompareSpecial;
use crate::error::invariant_violation;
use crate::ir::operation::{Operation, OperationKind, COMPARE_START, UNARY_COUNT};
use crate::ir::typing::{pow2, IntType, ScalarType};

/// Truth of a comparison between two ordered values (false on unordered ones, except `!=`)
pub(crate) fn compare_values<T: PartialOrd>(kind: OperationKind, lhs: &T, rhs: &T) -> bool {
    match kind {
        OperationKind::CompareLess => lhs < rhs,
        OperationKind::CompareLessOrEqual => lhs <= rhs,
        OperationKind::CompareEqual => lhs == rhs,
        OperationKind::CompareDifferent => lhs != rhs,
        OperationKind::CompareGreaterOrEqual => lhs >= rhs,
        OperationKind::CompareGreater => lhs > rhs,
        _ => invariant_violation(format!("{} is not a comparison", kind)),
    }
}

/// An erroneous concrete execution: pruned, or an unknown value of the result type
fn fold_error(ctx: &mut EvalContext<'_>, kind: ErrorKind, result: ScalarType) -> bool {
    ctx.flag_error(kind, true);
    if ctx.stops_on_error() {
        ctx.set_empty();
        ctx.merge_verdict_exact();
        return true;
    }
    let int = result
        .bits_view()
        .unwrap_or_else(|| invariant_violation(format!("integer fold into {}", result)));
    produce_int(ctx, result, int.min_value(), int.max_value(), false)
}

/// Evaluate an operation on concrete bits or integers
///
/// `receiver` is the type of `x`, `argument` the second operand with its type. Both bits and
/// integers are handled through their integer view; the result goes to the context.
pub(crate) fn fold_int(
    ctx: &mut EvalContext<'_>,
    op: &Operation,
    receiver: ScalarType,
    x: &BigInt,
    argument: Option<(ScalarType, &BigInt)>,
) -> bool {
    let result = op
        .result_type(receiver, argument.map(|(ty, _)| ty))
        .unwrap_or_else(|e| invariant_violation(e.to_string()));
    let ty = receiver
        .bits_view()
        .unwrap_or_else(|| invariant_violation(format!("integer fold on {}", receiver)));
    let single = |ctx: &mut EvalContext<'_>, value: BigInt| {
        produce_int(ctx, result, value.clone(), value, true)
    };
    let overflowing = |ctx: &mut EvalContext<'_>, value: BigInt| {
        produce_overflowing(ctx, result, value.clone(), value, true)
    };
    let truth = |ctx: &mut EvalContext<'_>, value: bool| single(ctx, BigInt::from(value as u8));

    let (y_ty, y) = match (op.arity(), argument) {
        (0, _) => (ty, BigInt::zero()),
        (_, Some((y_ty, y))) => match y_ty.bits_view() {
            Some(view) => (view, y.clone()),
            None => invariant_violation(format!("{} with a {} operand", op, y_ty)),
        },
        (_, None) => invariant_violation(format!("{} applied without its operand", op)),
    };

    match op {
        Operation::Prev => overflowing(ctx, x - 1),
        Operation::Next => overflowing(ctx, x + 1),
        Operation::Opposite => overflowing(ctx, -x),
        Operation::BitNegate => single(ctx, ty.from_bits(&(low_mask(ty.width()) ^ ty.to_bits(x)))),
        Operation::LogicalNegate => truth(ctx, x.is_zero()),
        Operation::CastBit => truth(ctx, !x.is_zero()),
        Operation::CastInt { .. } => overflowing(ctx, x.clone()),
        Operation::CastFloat { to } => float::produce_from_ints(ctx, *to, x, x, true),
        Operation::ExtendWithZero { .. } => single(ctx, ty.to_bits(x)),
        Operation::ExtendWithSign { .. } => {
            let signed = ty.with_signedness(true).from_bits(&ty.to_bits(x));
            match result.as_int() {
                Some(wide) => single(ctx, wide.wrap(&signed)),
                None => invariant_violation("sign extension into a non-integer"),
            }
        }
        Operation::Reduce { low, high } => {
            let bits = floor_div(&ty.to_bits(x), &pow2(*low));
            single(ctx, bits % pow2(high - low))
        }
        Operation::CompareLess
        | Operation::CompareLessOrEqual
        | Operation::CompareEqual
        | Operation::CompareDifferent
        | Operation::CompareGreaterOrEqual
        | Operation::CompareGreater => truth(ctx, compare_values(op.kind(), x, &y)),
        Operation::Plus => overflowing(ctx, x + &y),
        Operation::Minus => overflowing(ctx, x - &y),
        Operation::Times => overflowing(ctx, x * &y),
        Operation::Divide if y.is_zero() => fold_error(ctx, ErrorKind::DivisionByZero, result),
        Operation::Divide => overflowing(ctx, x / &y),
        Operation::Modulo if y.is_zero() => fold_error(ctx, ErrorKind::DivisionByZero, result),
        Operation::Modulo => single(ctx, x % &y),
        Operation::Min => single(ctx, x.min(&y).clone()),
        Operation::Max => single(ctx, x.max(&y).clone()),
        Operation::BitOr => single(ctx, ty.from_bits(&(ty.to_bits(x) | ty.to_bits(&y)))),
        Operation::BitAnd => single(ctx, ty.from_bits(&(ty.to_bits(x) & ty.to_bits(&y)))),
        Operation::BitXor => single(ctx, ty.from_bits(&(ty.to_bits(x) ^ ty.to_bits(&y)))),
        Operation::LeftShift | Operation::RightShift => match shift_amount(&y, ty.width()) {
            None => fold_error(ctx, ErrorKind::PositiveOverflow, result),
            Some(k) if matches!(op, Operation::LeftShift) => single(ctx, ty.wrap(&(x << k))),
            Some(k) => single(ctx, floor_div(x, &pow2(k))),
        },
        Operation::LeftRotate => single(ctx, rotate_left(&ty, x, rotate_amount(&y, ty.width()))),
        Operation::RightRotate => {
            let k = rotate_amount(&y, ty.width());
            single(ctx, rotate_left(&ty, x, (ty.width() - k) % ty.width()))
        }
        Operation::LogicalAnd => truth(ctx, !x.is_zero() && !y.is_zero()),
        Operation::LogicalOr => truth(ctx, !x.is_zero() || !y.is_zero()),
        Operation::Concat => single(ctx, ty.to_bits(x) * pow2(y_ty.width()) + y_ty.to_bits(&y)),
        Operation::BitSet { low, high } => {
            let field = low_mask(high - low) << *low;
            let cleared = ty.to_bits(x) & (low_mask(ty.width()) ^ field);
            single(ctx, ty.from_bits(&(cleared | (y_ty.to_bits(&y) << *low))))
        }
    }
}

/// A constant of a multi-bit integer type
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntConstant {
    ty: IntType,
    value: BigInt,
}

impl IntConstant {
    pub(crate) fn new(ty: IntType, value: BigInt) -> Self {
        if !ty.contains(&value) {
            invariant_violation(format!("constant {} out of range for {}", value, ty));
        }
        Self { ty, value }
    }

    pub fn ty(&self) -> &IntType {
        &self.ty
    }

    pub fn value(&self) -> &BigInt {
        &self.value
    }

    /// Fold against the constant operand, if it is one
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
            ScalarType::Int(self.ty),
            &self.value,
            argument.as_ref().map(|(ty, value)| (*ty, value)),
        )
    }

    /// Fold against every member of a disjunction operand
    fn apply_spread(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        disjunction::spread_argument(&ScalarElement::Int(self.clone()), op, ctx)
    }
}

impl AbstractDomain for IntConstant {
    const PRECISION: PrecisionKind = PrecisionKind::Constant;

    fn scalar_type(&self) -> ScalarType {
        ScalarType::Int(self.ty)
    }

    fn merge(&self, other: &ScalarElement) -> Option<ScalarElement> {
        match other {
            ScalarElement::Int(o) if o.value == self.value => Some(other.clone()),
            ScalarElement::Int(o) => Some(ScalarElement::from_int_values(
                self.scalar_type(),
                vec![self.value.clone(), o.value.clone()],
            )),
            _ => None,
        }
    }

    fn intersect(&self, other: &ScalarElement) -> Option<Meet> {
        match other {
            ScalarElement::Int(o) if o.value == self.value => Some(Meet::Element(other.clone())),
            ScalarElement::Int(_) => Some(Meet::Bottom),
            _ => None,
        }
    }

    fn contain(&self, other: &ScalarElement) -> Option<bool> {
        match other {
            ScalarElement::Int(o) => Some(o.value == self.value),
            _ => None,
        }
    }

    fn contain_to(&self, source: &ScalarElement) -> Option<bool> {
        match source {
            ScalarElement::Int(o) => Some(o.value == self.value),
            _ => None,
        }
    }

    fn compare_special(&self) -> CompareSpecial {
        CompareSpecial::of_value(&self.ty, &self.value)
    }
}

fn build_apply_table() -> MethodTable<ApplyHandler<IntConstant>> {
    let mut table: MethodTable<ApplyHandler<IntConstant>> = MethodTable::new();
    table
        .bind_all(
            &OperationKind::ALL[..UNARY_COUNT],
            Handler::Bound(IntConstant::apply_fold),
        )
        .bind_all(
            &OperationKind::ALL[COMPARE_START..],
            Handler::Specialized {
                constant: IntConstant::apply_fold,
                general: IntConstant::apply_spread,
            },
        );
    table
}

lazy_static! {
    pub static ref APPLY: MethodTable<ApplyHandler<IntConstant>> = build_apply_table();
    pub static ref CONSTRAINT: MethodTable<ConstraintHandler<IntConstant>> =
        propagate::integer_table();
    pub static ref QUERY: QueryTable = query::integer_table();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::params::{EXACT_PROPAGATE, EXACT_STOP};

    fn i8t() -> IntType {
        IntType::signed(8).unwrap()
    }

    fn int(v: i64) -> ScalarElement {
        ScalarElement::int(i8t(), v).unwrap()
    }

    fn run<'a>(
        x: &ScalarElement,
        op: Operation,
        y: Option<&'a ScalarElement>,
        stop: bool,
    ) -> EvalContext<'a> {
        let params = if stop { &*EXACT_STOP } else { &*EXACT_PROPAGATE };
        let mut ctx = EvalContext::new(params);
        if let Some(y) = y {
            ctx = ctx.with_argument(y);
        }
        assert!(x.apply(&op, &mut ctx));
        ctx
    }

    #[test]
    fn arithmetic_folds_with_overflow() {
        let (a, b, c) = (int(100), int(27), int(28));
        let ctx = run(&a, Operation::Plus, Some(&b), true);
        assert_eq!(ctx.result(), Some(&int(127)));
        assert!(ctx.is_exact());

        let ctx = run(&a, Operation::Plus, Some(&c), true);
        assert!(ctx.is_empty());
        assert!(ctx.errors().is_certain(ErrorKind::PositiveOverflow));

        let ctx = run(&a, Operation::Plus, Some(&c), false);
        assert_eq!(ctx.result(), Some(&int(-128)));
        assert!(ctx.errors().is_certain(ErrorKind::PositiveOverflow));
        assert!(!ctx.is_exact());

        let (min, minus_one) = (int(-128), int(-1));
        let ctx = run(&min, Operation::Divide, Some(&minus_one), false);
        assert_eq!(ctx.result(), Some(&int(-128)));
        assert!(ctx.errors().is_certain(ErrorKind::PositiveOverflow));
        assert!(!ctx.is_exact());
    }

    #[test]
    fn division_truncates() {
        let (x, two, zero) = (int(-7), int(2), int(0));
        let ctx = run(&x, Operation::Divide, Some(&two), true);
        assert_eq!(ctx.result(), Some(&int(-3)));
        let ctx = run(&x, Operation::Modulo, Some(&two), true);
        assert_eq!(ctx.result(), Some(&int(-1)));

        let ctx = run(&x, Operation::Modulo, Some(&zero), true);
        assert!(ctx.is_empty());
        assert!(ctx.errors().is_certain(ErrorKind::DivisionByZero));

        let ctx = run(&x, Operation::Divide, Some(&zero), false);
        assert_eq!(ctx.result(), Some(&ScalarElement::int_range(i8t(), -128, 127).unwrap()));
        assert!(!ctx.is_exact());
    }

    #[test]
    fn bit_level_folds() {
        let (minus_one, three) = (int(-1), int(3));
        let ctx = run(&minus_one, Operation::RightShift, Some(&three), true);
        assert_eq!(ctx.result(), Some(&int(-1)));

        let (x, one) = (int(64), int(1));
        let ctx = run(&x, Operation::LeftShift, Some(&one), true);
        assert_eq!(ctx.result(), Some(&int(-128)));
        let ctx = run(&one, Operation::RightRotate, Some(&one), true);
        assert_eq!(ctx.result(), Some(&int(-128)));

        let low = int(0x0f);
        let ctx = run(&low, Operation::BitXor, Some(&minus_one), true);
        assert_eq!(ctx.result(), Some(&int(-16)));

        let ctx = run(&int(-2), Operation::extend_with_zero(8).unwrap(), None, true);
        let i16t = IntType::signed(16).unwrap();
        assert_eq!(ctx.result(), Some(&ScalarElement::int(i16t, 254).unwrap()));

        let u8t = IntType::unsigned(8).unwrap();
        let ctx = run(&int(-2), Operation::CastInt { to: u8t }, None, true);
        assert!(ctx.is_empty());
        assert!(ctx.errors().is_certain(ErrorKind::NegativeOverflow));

        let x = ScalarElement::int(u8t, 0xab).unwrap();
        let y = ScalarElement::int(IntType::unsigned(4).unwrap(), 0x5).unwrap();
        let ctx = run(&x, Operation::bit_set(4, 8).unwrap(), Some(&y), true);
        assert_eq!(ctx.result(), Some(&ScalarElement::int(u8t, 0x5b).unwrap()));
        let ctx = run(&x, Operation::Concat, Some(&y), true);
        let u12 = IntType::unsigned(12).unwrap();
        assert_eq!(ctx.result(), Some(&ScalarElement::int(u12, 0xab5).unwrap()));
    }

    #[test]
    fn constant_spreads_over_a_disjunction() {
        let x = int(10);
        let set = ScalarElement::disjunction(i8t(), vec![BigInt::from(1), BigInt::from(3)]).unwrap();
        let ctx = run(&x, Operation::Minus, Some(&set), true);
        let expected =
            ScalarElement::disjunction(i8t(), vec![BigInt::from(7), BigInt::from(9)]).unwrap();
        assert_eq!(ctx.result(), Some(&expected));
        assert!(ctx.is_exact());
    }

    #[test]
    fn constant_promotes_against_an_interval() {
        let x = int(10);
        let y = ScalarElement::int_range(i8t(), 1, 3).unwrap();
        let ctx = run(&x, Operation::Plus, Some(&y), true);
        assert_eq!(ctx.result(), Some(&ScalarElement::int_range(i8t(), 11, 13).unwrap()));
    }
}
