//
// Integer intervals and the construction of integer results
//

use lazy_static::lazy_static;
use log::debug;
use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};

use libra_shared::config::DISJUNCTION_LIMIT;

use crate::analysis::context::{ErrorKind, EvalContext, LatticeCreation};
use crate::analysis::disjunction::Disjunction;
use crate::analysis::dispatch::{
    argument_bounds, result_type_of, ApplyHandler, ConstraintHandler, Handler, MethodTable,
    QueryTable,
};
use crate::analysis::element::ScalarElement;
use crate::analysis::float;
use crate::analysis::generic::{AbstractDomain, Meet};
use crate::analysis::lattice::PrecisionKind;
use crate::analysis::numeric::{
    bits_range_to_values, floor_div, hull, low_mask, max_of, meet, min_of, rotate_amount,
    value_range_to_bits,
};
use crate::analysis::propagate;
use crate::analysis::propagate::bitrange::extension_segments;
use crate::analysis::query;
use crate::analysis::sign::CompareSpecial;
use crate::error::invariant_violation;
use crate::ir::operation::{Operation, OperationKind, BINARY_START, COMPARE_START};
use crate::ir::typing::{pow2, IntType, ScalarType};

//
// Result construction
//

fn int_view(ty: ScalarType) -> IntType {
    ty.bits_view()
        .unwrap_or_else(|| invariant_violation(format!("integer result of type {}", ty)))
}

/// Deliver the values `[lo, hi]` of `ty` as the most precise shape the creation bound allows
///
/// `exact` tells whether the range is exactly the set of results. A shape the bound forbids
/// leaves the context without result: the operation is not performed.
pub(crate) fn produce_int(
    ctx: &mut EvalContext<'_>,
    ty: ScalarType,
    lo: BigInt,
    hi: BigInt,
    exact: bool,
) -> bool {
    if lo > hi {
        ctx.set_empty();
        ctx.merge_verdict_exact();
        return true;
    }
    let int = int_view(ty);
    if lo == hi || ty == ScalarType::Bit {
        ctx.set_result(ScalarElement::from_int_range(ty, lo, hi));
        ctx.merge_verdict(exact);
        return true;
    }

    let bound = ctx.creation_bound();
    let full = lo == int.min_value() && hi == int.max_value();
    let count = &hi - &lo + 1;
    let element = if full && bound >= LatticeCreation::ShareTop {
        Some(ScalarElement::top(ty))
    } else if bound >= LatticeCreation::Interval {
        Some(ScalarElement::IntInterval(IntInterval::new(int, lo, hi)))
    } else if bound >= LatticeCreation::Disjunction && count <= BigInt::from(*DISJUNCTION_LIMIT) {
        let mut values = vec![];
        let mut value = lo;
        while value <= hi {
            values.push(value.clone());
            value += 1;
        }
        Some(ScalarElement::Disjunction(Disjunction::new(int, values)))
    } else {
        None
    };
    match element {
        Some(element) => {
            ctx.set_result(element);
            ctx.merge_verdict(exact);
        }
        None => debug!("creation bound {:?} forbids {} values, not performed", bound, count),
    }
    true
}

/// Deliver the mathematical results `[lo, hi]` of an operation into `ty`, handling overflow
///
/// Out-of-range results are errors: pruned when stopping on errors, wrapped around and degraded
/// otherwise.
pub(crate) fn produce_overflowing(
    ctx: &mut EvalContext<'_>,
    ty: ScalarType,
    lo: BigInt,
    hi: BigInt,
    exact: bool,
) -> bool {
    let int = int_view(ty);
    let (min, max) = (int.min_value(), int.max_value());
    let above = hi > max;
    let below = lo < min;
    if !above && !below {
        return produce_int(ctx, ty, lo, hi, exact);
    }
    if above {
        ctx.flag_error(ErrorKind::PositiveOverflow, lo > max);
    }
    if below {
        ctx.flag_error(ErrorKind::NegativeOverflow, hi < min);
    }

    if ctx.stops_on_error() {
        let lo = lo.max(min);
        let hi = hi.min(max);
        return produce_int(ctx, ty, lo, hi, exact);
    }
    if &hi - &lo + 1 >= int.modulus() {
        return produce_int(ctx, ty, min, max, false);
    }
    let (wrapped_lo, wrapped_hi) = (int.wrap(&lo), int.wrap(&hi));
    if wrapped_lo <= wrapped_hi {
        produce_int(ctx, ty, wrapped_lo, wrapped_hi, false)
    } else {
        produce_int(ctx, ty, min, max, false)
    }
}

/// Deliver a boolean known through its zero classification
pub(crate) fn produce_truth(ctx: &mut EvalContext<'_>, special: &CompareSpecial, negate: bool) -> bool {
    if special.is_bottom() {
        ctx.set_empty();
    } else if special.is_zero() {
        ctx.set_result(ScalarElement::bit(negate));
    } else if special.is_nonzero() {
        ctx.set_result(ScalarElement::bit(!negate));
    } else {
        ctx.set_result(ScalarElement::top(ScalarType::Bit));
    }
    ctx.merge_verdict_exact();
    true
}

/// Logical and/or of any two scalars through their zero classification
pub(crate) fn apply_logical(receiver: &ScalarElement, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
    let lhs = receiver.compare_special();
    let rhs = match ctx.argument() {
        None => invariant_violation("logical operation without its operand"),
        Some(argument) => argument.compare_special(),
    };
    let outcome = match op {
        Operation::LogicalAnd if lhs.is_zero() || rhs.is_zero() => Some(false),
        Operation::LogicalAnd if lhs.is_nonzero() && rhs.is_nonzero() => Some(true),
        Operation::LogicalOr if lhs.is_nonzero() || rhs.is_nonzero() => Some(true),
        Operation::LogicalOr if lhs.is_zero() && rhs.is_zero() => Some(false),
        _ => None,
    };
    match outcome {
        Some(value) => ctx.set_result(ScalarElement::bit(value)),
        None => ctx.set_result(ScalarElement::top(ScalarType::Bit)),
    }
    ctx.merge_verdict_exact();
    true
}

/// Outcome of a comparison certain for every pair of values in the two ranges
pub(crate) fn compare_ranges<T: PartialOrd>(
    kind: OperationKind,
    lhs: (&T, &T),
    rhs: (&T, &T),
) -> Option<bool> {
    let ((a_lo, a_hi), (b_lo, b_hi)) = (lhs, rhs);
    match kind {
        OperationKind::CompareLess => {
            if a_hi < b_lo {
                Some(true)
            } else if a_lo >= b_hi {
                Some(false)
            } else {
                None
            }
        }
        OperationKind::CompareLessOrEqual => {
            if a_hi <= b_lo {
                Some(true)
            } else if a_lo > b_hi {
                Some(false)
            } else {
                None
            }
        }
        OperationKind::CompareEqual => {
            if a_lo == a_hi && b_lo == b_hi && a_lo == b_lo {
                Some(true)
            } else if a_hi < b_lo || b_hi < a_lo {
                Some(false)
            } else {
                None
            }
        }
        OperationKind::CompareDifferent => {
            compare_ranges(OperationKind::CompareEqual, lhs, rhs).map(|equal| !equal)
        }
        OperationKind::CompareGreaterOrEqual | OperationKind::CompareGreater => {
            compare_ranges(kind.mirror(), rhs, lhs)
        }
        _ => invariant_violation(format!("{} is not a comparison", kind)),
    }
}

fn convex_argument(ctx: &EvalContext<'_>) -> bool {
    !matches!(ctx.argument(), Some(ScalarElement::Disjunction(_)))
}

//
// Interval element
//

/// The integers `[lo, hi]` of a type
///
/// Public constructors collapse singletons to constants; a singleton interval only exists
/// transiently, as the promotion of a constant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntInterval {
    ty: IntType,
    lo: BigInt,
    hi: BigInt,
}

impl IntInterval {
    pub(crate) fn new(ty: IntType, lo: BigInt, hi: BigInt) -> Self {
        if lo > hi || !ty.contains(&lo) || !ty.contains(&hi) {
            invariant_violation(format!("malformed interval [{}, {}] of {}", lo, hi, ty));
        }
        Self { ty, lo, hi }
    }

    pub(crate) fn full(ty: IntType) -> Self {
        Self {
            ty,
            lo: ty.min_value(),
            hi: ty.max_value(),
        }
    }

    pub fn ty(&self) -> &IntType {
        &self.ty
    }

    pub fn lo(&self) -> &BigInt {
        &self.lo
    }

    pub fn hi(&self) -> &BigInt {
        &self.hi
    }

    pub fn is_full(&self) -> bool {
        self.lo == self.ty.min_value() && self.hi == self.ty.max_value()
    }

    fn contains(&self, value: &BigInt) -> bool {
        &self.lo <= value && value <= &self.hi
    }

    fn own_type(&self) -> ScalarType {
        ScalarType::Int(self.ty)
    }

    fn produce_full(&self, ctx: &mut EvalContext<'_>, ty: ScalarType) -> bool {
        let int = int_view(ty);
        produce_int(ctx, ty, int.min_value(), int.max_value(), false)
    }

    fn apply_step(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let (lo, hi) = match op {
            Operation::Prev => (&self.lo - 1, &self.hi - 1),
            Operation::Next => (&self.lo + 1, &self.hi + 1),
            _ => (-&self.hi, -&self.lo),
        };
        produce_overflowing(ctx, self.own_type(), lo, hi, true)
    }

    fn apply_bit_negate(&self, _op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        // !x is the decreasing map all_ones - x on the bit patterns
        let negate = |v: &BigInt| self.ty.from_bits(&(low_mask(self.ty.width()) ^ self.ty.to_bits(v)));
        let pieces = value_range_to_bits(&self.ty, &self.lo, &self.hi);
        let mut images = vec![];
        for (lo, hi) in &pieces {
            let (lo, hi) = (self.ty.from_bits(lo), self.ty.from_bits(hi));
            images.push((negate(&hi), negate(&lo)));
        }
        let exact = images.len() == 1;
        match hull(&images) {
            Some((lo, hi)) => produce_int(ctx, self.own_type(), lo, hi, exact),
            None => invariant_violation("bit negation of an empty interval"),
        }
    }

    fn apply_zero_test(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        produce_truth(
            ctx,
            &self.compare_special(),
            matches!(op, Operation::LogicalNegate),
        )
    }

    fn apply_cast_int(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let ty = result_type_of(self.own_type(), op, ctx);
        produce_overflowing(ctx, ty, self.lo.clone(), self.hi.clone(), true)
    }

    fn apply_cast_float(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        match op {
            Operation::CastFloat { to } => float::produce_from_ints(ctx, *to, &self.lo, &self.hi, false),
            _ => invariant_violation(format!("{} dispatched as a float cast", op)),
        }
    }

    fn apply_extend(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let ty = result_type_of(self.own_type(), op, ctx);
        let sign = matches!(op, Operation::ExtendWithSign { .. });
        let mut images = vec![];
        for (seg_lo, seg_hi, offset) in extension_segments(&self.ty, sign, &int_view(ty)) {
            if let Some((lo, hi)) = meet(&(seg_lo, seg_hi), &(self.lo.clone(), self.hi.clone())) {
                images.push((lo + &offset, hi + &offset));
            }
        }
        let exact = images.len() == 1;
        match hull(&images) {
            Some((lo, hi)) => produce_int(ctx, ty, lo, hi, exact),
            None => invariant_violation("extension of an empty interval"),
        }
    }

    fn apply_reduce(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let ty = result_type_of(self.own_type(), op, ctx);
        let (low, high) = match op.bit_range() {
            Some(range) => range,
            None => invariant_violation(format!("{} without a bit range", op)),
        };
        let modulus = pow2(high - low);
        let mut images = vec![];
        let mut exact = true;
        for (lo, hi) in value_range_to_bits(&self.ty, &self.lo, &self.hi) {
            let shifted_lo = floor_div(&lo, &pow2(low));
            let shifted_hi = floor_div(&hi, &pow2(low));
            let (a, b) = (&shifted_lo % &modulus, &shifted_hi % &modulus);
            if &shifted_hi - &shifted_lo + 1 >= modulus || a > b {
                images.push((BigInt::zero(), &modulus - 1));
                exact = false;
            } else {
                images.push((a, b));
            }
        }
        exact &= images.len() == 1;
        match hull(&images) {
            Some((lo, hi)) => produce_int(ctx, ty, lo, hi, exact),
            None => invariant_violation("reduction of an empty interval"),
        }
    }

    fn apply_compare(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let (_, lo, hi) = argument_bounds(ctx);
        let exact = convex_argument(ctx);
        match compare_ranges(op.kind(), (&self.lo, &self.hi), (&lo, &hi)) {
            Some(outcome) => {
                ctx.set_result(ScalarElement::bit(outcome));
                ctx.merge_verdict_exact();
            }
            None => {
                ctx.set_result(ScalarElement::top(ScalarType::Bit));
                ctx.merge_verdict(exact);
            }
        }
        true
    }

    fn apply_additive(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let (_, lo, hi) = argument_bounds(ctx);
        let exact = convex_argument(ctx);
        let (lo, hi) = match op {
            Operation::Plus => (&self.lo + lo, &self.hi + hi),
            _ => (&self.lo - hi, &self.hi - lo),
        };
        produce_overflowing(ctx, self.own_type(), lo, hi, exact)
    }

    fn apply_times_constant(&self, _op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let factor = match ctx.argument().and_then(|a| a.int_constant()) {
            Some(factor) => factor,
            None => return false,
        };
        if factor.is_zero() {
            produce_int(ctx, self.own_type(), BigInt::zero(), BigInt::zero(), true)
        } else if factor.is_one() {
            produce_int(ctx, self.own_type(), self.lo.clone(), self.hi.clone(), true)
        } else {
            false
        }
    }

    fn apply_times(&self, _op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let (_, lo, hi) = argument_bounds(ctx);
        let corners = [&self.lo * &lo, &self.lo * &hi, &self.hi * &lo, &self.hi * &hi];
        match (min_of(&corners), max_of(&corners)) {
            (Some(lo), Some(hi)) => produce_overflowing(ctx, self.own_type(), lo, hi, false),
            _ => invariant_violation("no corner in a product"),
        }
    }

    /// Non-zero parts of the divisor, or `None` when the outcome is already decided
    fn divisor_parts(&self, ctx: &mut EvalContext<'_>) -> Option<Vec<(BigInt, BigInt)>> {
        let (_, lo, hi) = argument_bounds(ctx);
        if !lo.is_positive() && !hi.is_negative() {
            ctx.flag_error(ErrorKind::DivisionByZero, lo.is_zero() && hi.is_zero());
            if !ctx.stops_on_error() {
                self.produce_full(ctx, self.own_type());
                return None;
            }
        }
        let mut parts = vec![];
        if lo.is_negative() {
            parts.push((lo.clone(), hi.clone().min(-BigInt::one())));
        }
        if hi.is_positive() {
            parts.push((lo.max(BigInt::one()), hi));
        }
        if parts.is_empty() {
            ctx.set_empty();
            ctx.merge_verdict_exact();
            return None;
        }
        Some(parts)
    }

    fn apply_divide(&self, _op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let parts = match self.divisor_parts(ctx) {
            None => return true,
            Some(parts) => parts,
        };
        let mut quotients = vec![];
        for (part_lo, part_hi) in &parts {
            for x in [&self.lo, &self.hi] {
                for y in [part_lo, part_hi] {
                    quotients.push(x / y);
                }
            }
        }
        match (min_of(&quotients), max_of(&quotients)) {
            (Some(lo), Some(hi)) => produce_overflowing(ctx, self.own_type(), lo, hi, false),
            _ => invariant_violation("no corner in a quotient"),
        }
    }

    fn apply_modulo(&self, _op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let parts = match self.divisor_parts(ctx) {
            None => return true,
            Some(parts) => parts,
        };
        // one divisor and one quotient: the remainders are contiguous
        if let [(y, other)] = parts.as_slice() {
            let same_sign = !self.lo.is_negative() || !self.hi.is_positive();
            if y == other && same_sign && &self.lo / y == &self.hi / y {
                return produce_int(ctx, self.own_type(), &self.lo % y, &self.hi % y, true);
            }
        }
        let magnitude = parts
            .iter()
            .flat_map(|(lo, hi)| [lo.abs(), hi.abs()])
            .max()
            .unwrap_or_else(BigInt::one);
        let lo = if self.lo.is_negative() {
            self.lo.clone().max(BigInt::one() - &magnitude)
        } else {
            BigInt::zero()
        };
        let hi = if self.hi.is_positive() {
            self.hi.clone().min(&magnitude - BigInt::one())
        } else {
            BigInt::zero()
        };
        produce_int(ctx, self.own_type(), lo, hi, false)
    }

    fn apply_extremum(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let (_, lo, hi) = argument_bounds(ctx);
        let exact = convex_argument(ctx);
        let (lo, hi) = match op {
            Operation::Min => (self.lo.clone().min(lo), self.hi.clone().min(hi)),
            _ => (self.lo.clone().max(lo), self.hi.clone().max(hi)),
        };
        produce_int(ctx, self.own_type(), lo, hi, exact)
    }

    fn apply_bitwise_constant(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let mask = match ctx.argument().and_then(|a| a.int_constant()) {
            Some(mask) => mask,
            None => return false,
        };
        let all_ones = self.ty.all_ones();
        let (lo, hi) = match op {
            Operation::BitAnd if mask.is_zero() => (BigInt::zero(), BigInt::zero()),
            Operation::BitAnd if mask == all_ones => (self.lo.clone(), self.hi.clone()),
            Operation::BitOr if mask.is_zero() => (self.lo.clone(), self.hi.clone()),
            Operation::BitOr if mask == all_ones => (all_ones.clone(), all_ones),
            _ => return false,
        };
        produce_int(ctx, self.own_type(), lo, hi, true)
    }

    fn apply_bitwise(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let (_, b_lo, b_hi) = argument_bounds(ctx);
        let (a_lo, a_hi) = (&self.lo, &self.hi);
        let a_natural = !a_lo.is_negative();
        let b_natural = !b_lo.is_negative();
        let span = |x: &BigInt, y: &BigInt| low_mask(x.bits().max(y.bits()) as u32);
        let bounds = match op {
            Operation::BitAnd if a_natural && b_natural => {
                Some((BigInt::zero(), a_hi.clone().min(b_hi.clone())))
            }
            Operation::BitAnd if a_natural => Some((BigInt::zero(), a_hi.clone())),
            Operation::BitAnd if b_natural => Some((BigInt::zero(), b_hi)),
            Operation::BitOr if a_natural && b_natural => {
                Some((a_lo.clone().max(b_lo.clone()), span(a_hi, &b_hi)))
            }
            Operation::BitOr if a_hi.is_negative() && b_hi.is_negative() => {
                Some((a_lo.clone().max(b_lo), -BigInt::one()))
            }
            Operation::BitOr if a_hi.is_negative() => Some((a_lo.clone(), -BigInt::one())),
            Operation::BitOr if b_hi.is_negative() => Some((b_lo, -BigInt::one())),
            Operation::BitXor if a_natural && b_natural => Some((BigInt::zero(), span(a_hi, &b_hi))),
            _ => None,
        };
        match bounds {
            Some((lo, hi)) => produce_int(ctx, self.own_type(), lo, hi, false),
            None => self.produce_full(ctx, self.own_type()),
        }
    }

    fn apply_shift(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let ty = self.own_type();
        let width = BigInt::from(self.ty.width());
        let (_, k_lo, k_hi) = argument_bounds(ctx);
        let valid_lo = k_lo.clone().max(BigInt::zero());
        let valid_hi = k_hi.clone().min(&width - 1);
        if k_lo.is_negative() || k_hi >= width {
            ctx.flag_error(ErrorKind::PositiveOverflow, valid_lo > valid_hi);
            if !ctx.stops_on_error() {
                return self.produce_full(ctx, ty);
            }
        }
        if valid_lo > valid_hi {
            ctx.set_empty();
            ctx.merge_verdict_exact();
            return true;
        }
        let amounts: Vec<u32> = (0..self.ty.width())
            .filter(|k| valid_lo <= BigInt::from(*k) && BigInt::from(*k) <= valid_hi)
            .collect();

        match op {
            Operation::RightShift => {
                let mut images = vec![];
                for k in [amounts[0], amounts[amounts.len() - 1]] {
                    let scale = pow2(k);
                    images.push(floor_div(&self.lo, &scale));
                    images.push(floor_div(&self.hi, &scale));
                }
                match (min_of(&images), max_of(&images)) {
                    (Some(lo), Some(hi)) => produce_int(ctx, ty, lo, hi, amounts.len() == 1),
                    _ => invariant_violation("no corner in a right shift"),
                }
            }
            _ => {
                let mut images = vec![];
                for k in amounts {
                    let scale = pow2(k);
                    let (lo, hi) = (&self.lo * &scale, &self.hi * &scale);
                    if !self.ty.contains(&lo) || !self.ty.contains(&hi) {
                        return self.produce_full(ctx, ty);
                    }
                    images.push((lo, hi));
                }
                match hull(&images) {
                    Some((lo, hi)) => produce_int(ctx, ty, lo, hi, false),
                    None => invariant_violation("no image in a left shift"),
                }
            }
        }
    }

    fn apply_rotate(&self, _op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let width = self.ty.width();
        if let Some(amount) = ctx.argument().and_then(|a| a.int_constant()) {
            if rotate_amount(&amount, width) == 0 {
                return produce_int(ctx, self.own_type(), self.lo.clone(), self.hi.clone(), true);
            }
        }
        self.produce_full(ctx, self.own_type())
    }

    fn apply_concat(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let ty = result_type_of(self.own_type(), op, ctx);
        let (low_ty, y_lo, y_hi) = argument_bounds(ctx);
        let scale = pow2(low_ty.width());
        let high = value_range_to_bits(&self.ty, &self.lo, &self.hi);
        let low = value_range_to_bits(&low_ty, &y_lo, &y_hi);
        let mut images = vec![];
        for (h_lo, h_hi) in &high {
            for (l_lo, l_hi) in &low {
                images.push((h_lo * &scale + l_lo, h_hi * &scale + l_hi));
            }
        }
        let exact = self.lo == self.hi && images.len() == 1;
        match hull(&images) {
            Some((lo, hi)) => produce_int(ctx, ty, lo, hi, exact),
            None => invariant_violation("concatenation of an empty interval"),
        }
    }

    fn apply_bit_set(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let ty = self.own_type();
        if self.lo != self.hi {
            return self.produce_full(ctx, ty);
        }
        let (low, high) = match op.bit_range() {
            Some(range) => range,
            None => invariant_violation(format!("{} without a bit range", op)),
        };
        let (patch_ty, y_lo, y_hi) = argument_bounds(ctx);
        let cleared = self.ty.to_bits(&self.lo) & (low_mask(self.ty.width()) ^ (low_mask(high - low) << low));
        let mut images = vec![];
        for (p_lo, p_hi) in value_range_to_bits(&patch_ty, &y_lo, &y_hi) {
            let (b_lo, b_hi) = (&cleared + (p_lo << low), &cleared + (p_hi << low));
            images.extend(bits_range_to_values(&self.ty, &b_lo, &b_hi));
        }
        match hull(&images) {
            Some((lo, hi)) => produce_int(ctx, ty, lo, hi, false),
            None => invariant_violation("bit set of an empty patch"),
        }
    }
}

impl AbstractDomain for IntInterval {
    const PRECISION: PrecisionKind = PrecisionKind::Interval;

    fn scalar_type(&self) -> ScalarType {
        self.own_type()
    }

    fn merge(&self, other: &ScalarElement) -> Option<ScalarElement> {
        match other {
            ScalarElement::Int(_) | ScalarElement::IntInterval(_) | ScalarElement::Disjunction(_) => {
                let (_, lo, hi) = other.int_bounds()?;
                Some(ScalarElement::from_int_range(
                    self.own_type(),
                    lo.min(self.lo.clone()),
                    hi.max(self.hi.clone()),
                ))
            }
            _ => None,
        }
    }

    fn intersect(&self, other: &ScalarElement) -> Option<Meet> {
        let ty = self.own_type();
        let met = match other {
            ScalarElement::Int(c) if self.contains(c.value()) => Meet::Element(other.clone()),
            ScalarElement::Int(_) => Meet::Bottom,
            ScalarElement::IntInterval(o) => {
                match meet(&(self.lo.clone(), self.hi.clone()), &(o.lo.clone(), o.hi.clone())) {
                    None => Meet::Bottom,
                    Some((lo, hi)) => Meet::Element(ScalarElement::from_int_range(ty, lo, hi)),
                }
            }
            ScalarElement::Disjunction(d) => {
                let kept: Vec<BigInt> = d.values().iter().filter(|v| self.contains(v)).cloned().collect();
                if kept.is_empty() {
                    Meet::Bottom
                } else {
                    Meet::Element(ScalarElement::from_int_values(ty, kept))
                }
            }
            ScalarElement::Top(_) => {
                Meet::Element(ScalarElement::from_int_range(ty, self.lo.clone(), self.hi.clone()))
            }
            _ => return None,
        };
        Some(met)
    }

    fn contain(&self, other: &ScalarElement) -> Option<bool> {
        match other {
            ScalarElement::Int(_) | ScalarElement::IntInterval(_) | ScalarElement::Disjunction(_) => {
                let (_, lo, hi) = other.int_bounds()?;
                Some(self.lo <= lo && hi <= self.hi)
            }
            ScalarElement::Top(_) => Some(self.is_full()),
            _ => None,
        }
    }

    fn contain_to(&self, source: &ScalarElement) -> Option<bool> {
        match source {
            ScalarElement::Int(c) => Some(self.lo == self.hi && &self.lo == c.value()),
            ScalarElement::IntInterval(o) => Some(o.lo <= self.lo && self.hi <= o.hi),
            _ => None,
        }
    }

    fn compare_special(&self) -> CompareSpecial {
        CompareSpecial::of_range(&self.ty, &self.lo, &self.hi)
    }
}

fn build_apply_table() -> MethodTable<ApplyHandler<IntInterval>> {
    use OperationKind::*;

    let mut table: MethodTable<ApplyHandler<IntInterval>> = MethodTable::new();
    table
        .bind_all(&[Prev, Next, Opposite], Handler::Bound(IntInterval::apply_step))
        .bind(BitNegate, Handler::Bound(IntInterval::apply_bit_negate))
        .bind_all(&[LogicalNegate, CastBit], Handler::Bound(IntInterval::apply_zero_test))
        .bind(CastInt, Handler::Bound(IntInterval::apply_cast_int))
        .bind(CastFloat, Handler::Bound(IntInterval::apply_cast_float))
        .bind_all(&[ExtendWithZero, ExtendWithSign], Handler::Bound(IntInterval::apply_extend))
        .bind(Reduce, Handler::Bound(IntInterval::apply_reduce))
        .bind_all(
            &OperationKind::ALL[COMPARE_START..BINARY_START],
            Handler::Bound(IntInterval::apply_compare),
        )
        .bind_all(&[Plus, Minus], Handler::Bound(IntInterval::apply_additive))
        .bind(
            Times,
            Handler::Specialized {
                constant: IntInterval::apply_times_constant,
                general: IntInterval::apply_times,
            },
        )
        .bind(Divide, Handler::Bound(IntInterval::apply_divide))
        .bind(Modulo, Handler::Bound(IntInterval::apply_modulo))
        .bind_all(&[Min, Max], Handler::Bound(IntInterval::apply_extremum))
        .bind_all(
            &[BitAnd, BitOr],
            Handler::Specialized {
                constant: IntInterval::apply_bitwise_constant,
                general: IntInterval::apply_bitwise,
            },
        )
        .bind(BitXor, Handler::Bound(IntInterval::apply_bitwise))
        .bind_all(&[LeftShift, RightShift], Handler::Bound(IntInterval::apply_shift))
        .bind_all(&[LeftRotate, RightRotate], Handler::Bound(IntInterval::apply_rotate))
        .bind_all(&[LogicalAnd, LogicalOr], Handler::Generic(apply_logical))
        .bind(Concat, Handler::Bound(IntInterval::apply_concat))
        .bind(BitSet, Handler::Bound(IntInterval::apply_bit_set));
    table
}

lazy_static! {
    pub static ref APPLY: MethodTable<ApplyHandler<IntInterval>> = build_apply_table();
    pub static ref CONSTRAINT: MethodTable<ConstraintHandler<IntInterval>> =
        propagate::integer_table();
    pub static ref QUERY: QueryTable = query::integer_table();
}
