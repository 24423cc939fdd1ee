//
// Floating point elements
//

use lazy_static::lazy_static;
use log::debug;
use num_bigint::BigInt;
use num_traits::FromPrimitive;

use crate::analysis::constant::compare_values;
use crate::analysis::context::{ErrorKind, EvalContext, LatticeCreation};
use crate::analysis::dispatch::{
    ApplyFn, ApplyHandler, ConstraintHandler, Handler, MethodTable, QueryTable,
};
use crate::analysis::element::ScalarElement;
use crate::analysis::generic::{AbstractDomain, Meet};
use crate::analysis::lattice::PrecisionKind;
use crate::analysis::numeric::to_f64;
use crate::analysis::propagate::floating;
use crate::analysis::query;
use crate::analysis::range::{apply_logical, compare_ranges, produce_int, produce_overflowing};
use crate::analysis::sign::CompareSpecial;
use crate::error::invariant_violation;
use crate::ir::operation::{Operation, OperationKind, BINARY_START, COMPARE_START};
use crate::ir::typing::{FloatType, IntType, ScalarType};

const INF: f64 = f64::INFINITY;
const NEG_INF: f64 = f64::NEG_INFINITY;

/// Unary operations defined on floats
const FLOAT_UNARY: [OperationKind; 7] = [
    OperationKind::Prev,
    OperationKind::Next,
    OperationKind::Opposite,
    OperationKind::LogicalNegate,
    OperationKind::CastBit,
    OperationKind::CastInt,
    OperationKind::CastFloat,
];

/// Binary operations defined on floats, comparisons aside
const FLOAT_BINARY: [OperationKind; 9] = [
    OperationKind::Plus,
    OperationKind::Minus,
    OperationKind::Times,
    OperationKind::Divide,
    OperationKind::Modulo,
    OperationKind::Min,
    OperationKind::Max,
    OperationKind::LogicalAnd,
    OperationKind::LogicalOr,
];

/// Values of a float element: a closed range of non-NaN values and possibly NaN
///
/// A range holding zero holds both signed zeros.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FloatSet {
    range: Option<(f64, f64)>,
    nan: bool,
}

impl FloatSet {
    pub fn empty() -> Self {
        Self {
            range: None,
            nan: false,
        }
    }

    pub fn nan() -> Self {
        Self {
            range: None,
            nan: true,
        }
    }

    pub fn constant(value: f64) -> Self {
        if value.is_nan() {
            Self::nan()
        } else {
            Self::range(value, value)
        }
    }

    pub fn range(lo: f64, hi: f64) -> Self {
        Self {
            range: Some((lo, hi)),
            nan: false,
        }
    }

    /// Every float, NaN included
    pub fn full() -> Self {
        Self {
            range: Some((NEG_INF, INF)),
            nan: true,
        }
    }

    pub fn with_nan(mut self, nan: bool) -> Self {
        self.nan = nan;
        self
    }

    pub fn bounds(&self) -> Option<(f64, f64)> {
        self.range
    }

    pub fn may_be_nan(&self) -> bool {
        self.nan
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_none() && !self.nan
    }

    pub fn contains(&self, value: f64) -> bool {
        if value.is_nan() {
            return self.nan;
        }
        self.range.map_or(false, |(lo, hi)| lo <= value && value <= hi)
    }

    pub fn union(&self, other: &Self) -> Self {
        let range = match (self.range, other.range) {
            (Some((a, b)), Some((c, d))) => Some((a.min(c), b.max(d))),
            (range, None) | (None, range) => range,
        };
        Self {
            range,
            nan: self.nan || other.nan,
        }
    }

    pub fn meet(&self, other: &Self) -> Self {
        let range = match (self.range, other.range) {
            (Some((a, b)), Some((c, d))) if a.max(c) <= b.min(d) => Some((a.max(c), b.min(d))),
            _ => None,
        };
        Self {
            range,
            nan: self.nan && other.nan,
        }
    }

    /// Whether every value of `other` is here
    pub fn includes(&self, other: &Self) -> bool {
        if other.nan && !self.nan {
            return false;
        }
        match (self.range, other.range) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some((a, b)), Some((c, d))) => a <= c && d <= b,
        }
    }

    /// Whether the union of both sets leaves no gap between them
    pub fn touches(&self, other: &Self) -> bool {
        match (self.range, other.range) {
            (Some((a, b)), Some((c, d))) => a <= d && c <= b,
            _ => true,
        }
    }

    pub fn compare_special(&self, ty: &FloatType) -> CompareSpecial {
        let mut special = match self.range {
            Some((lo, hi)) => CompareSpecial::of_float_range(ty, lo, hi),
            None => CompareSpecial::bottom(),
        };
        if self.nan {
            special = special.join(&CompareSpecial::of_float(ty, f64::NAN));
        }
        special
    }

    fn map_range<F: Fn(f64) -> f64>(&self, f: F) -> Option<(f64, f64)> {
        self.range.map(|(lo, hi)| {
            let (a, b) = (f(lo), f(hi));
            (a.min(b), a.max(b))
        })
    }
}

//
// Result construction
//

/// Deliver a set of floats as the most precise shape the creation bound allows
///
/// A range with NaN only fits in a top, which is then accepted wherever intervals are.
pub(crate) fn produce_float(
    ctx: &mut EvalContext<'_>,
    ty: FloatType,
    set: FloatSet,
    exact: bool,
) -> bool {
    let element = match ScalarElement::from_float_set(ty, &set) {
        None => {
            ctx.set_empty();
            ctx.merge_verdict_exact();
            return true;
        }
        Some(element) => element,
    };
    if !element.is_constant() && ctx.creation_bound() < LatticeCreation::Interval {
        debug!("creation bound forbids {}, not performed", element);
        return true;
    }
    let exact = exact && (!element.is_top() || set == FloatSet::full());
    ctx.set_result(element);
    ctx.merge_verdict(exact);
    true
}

/// Flag results that left the finite range from finite operands; pruned when stopping
fn check_overflow(
    ctx: &mut EvalContext<'_>,
    ty: &FloatType,
    range: (f64, f64),
    finite_operands: bool,
) -> Option<(f64, f64)> {
    let (mut lo, mut hi) = range;
    if !finite_operands {
        return Some((lo, hi));
    }
    let stop = ctx.stops_on_error();
    if hi == INF {
        ctx.flag_error(ErrorKind::PositiveOverflow, lo == INF);
        if stop {
            hi = ty.max_finite();
        }
    }
    if lo == NEG_INF {
        ctx.flag_error(ErrorKind::NegativeOverflow, hi == NEG_INF);
        if stop {
            lo = -ty.max_finite();
        }
    }
    if lo > hi {
        None
    } else {
        Some((lo, hi))
    }
}

/// Deliver the conversion of the integers `[lo, hi]` into `to`
pub(crate) fn produce_from_ints(
    ctx: &mut EvalContext<'_>,
    to: FloatType,
    lo: &BigInt,
    hi: &BigInt,
    exact: bool,
) -> bool {
    let range = (to.round(to_f64(lo)), to.round(to_f64(hi)));
    match check_overflow(ctx, &to, range, true) {
        None => produce_float(ctx, to, FloatSet::empty(), true),
        Some((lo_f, hi_f)) => produce_float(ctx, to, FloatSet::range(lo_f, hi_f), exact && lo == hi),
    }
}

fn truncated(value: f64, to: &IntType) -> BigInt {
    match BigInt::from_f64(value.trunc()) {
        Some(int) => int,
        None if value > 0.0 => to.max_value() + 1,
        None => to.min_value() - 1,
    }
}

/// Deliver the truncation of a set of floats into `to`
fn produce_truncation(ctx: &mut EvalContext<'_>, to: IntType, set: &FloatSet, exact: bool) -> bool {
    let ty = ScalarType::Int(to);
    if set.nan {
        ctx.flag_error(ErrorKind::NaN, set.range.is_none());
        if !ctx.stops_on_error() {
            return produce_int(ctx, ty, to.min_value(), to.max_value(), false);
        }
    }
    match set.range {
        None => {
            ctx.set_empty();
            ctx.merge_verdict_exact();
            true
        }
        Some((lo, hi)) => {
            let (lo_i, hi_i) = (truncated(lo, &to), truncated(hi, &to));
            let exact = exact && lo_i == hi_i;
            produce_overflowing(ctx, ty, lo_i, hi_i, exact)
        }
    }
}

fn produce_truth_value(ctx: &mut EvalContext<'_>, value: bool) -> bool {
    produce_bit(ctx, value, !value)
}

fn produce_bit(ctx: &mut EvalContext<'_>, may_true: bool, may_false: bool) -> bool {
    match (may_true, may_false) {
        (true, true) => ctx.set_result(ScalarElement::top(ScalarType::Bit)),
        (true, false) => ctx.set_result(ScalarElement::bit(true)),
        (false, true) => ctx.set_result(ScalarElement::bit(false)),
        (false, false) => ctx.set_empty(),
    }
    ctx.merge_verdict_exact();
    true
}

//
// Concrete evaluation
//

/// Error raised by one concrete arithmetic step, if any
fn arithmetic_error(kind: OperationKind, x: f64, y: f64, result: f64) -> Option<ErrorKind> {
    let by_zero = matches!(kind, OperationKind::Divide | OperationKind::Modulo) && y == 0.0;
    if x.is_nan() || y.is_nan() {
        return None;
    }
    if by_zero {
        return Some(ErrorKind::DivisionByZero);
    }
    if result.is_nan() {
        return Some(ErrorKind::NaN);
    }
    if result.is_infinite() && x.is_finite() && y.is_finite() {
        return Some(if result > 0.0 {
            ErrorKind::PositiveOverflow
        } else {
            ErrorKind::NegativeOverflow
        });
    }
    let vanished = match kind {
        OperationKind::Times => x != 0.0 && y != 0.0,
        OperationKind::Divide => x != 0.0 && y.is_finite(),
        _ => false,
    };
    if result == 0.0 && vanished {
        return Some(ErrorKind::Underflow);
    }
    None
}

fn arithmetic(kind: OperationKind, x: f64, y: f64) -> f64 {
    match kind {
        OperationKind::Plus => x + y,
        OperationKind::Minus => x - y,
        OperationKind::Times => x * y,
        OperationKind::Divide => x / y,
        OperationKind::Modulo => x % y,
        OperationKind::Min => x.min(y),
        OperationKind::Max => x.max(y),
        _ => invariant_violation(format!("{} is not float arithmetic", kind)),
    }
}

/// Deliver one concrete float, checking overflow from a finite operand
fn fold_step(ctx: &mut EvalContext<'_>, ty: FloatType, x: f64, result: f64) -> bool {
    if result.is_infinite() && x.is_finite() {
        let kind = if result > 0.0 {
            ErrorKind::PositiveOverflow
        } else {
            ErrorKind::NegativeOverflow
        };
        ctx.flag_error(kind, true);
        if ctx.stops_on_error() {
            return produce_float(ctx, ty, FloatSet::empty(), true);
        }
        return produce_float(ctx, ty, FloatSet::constant(result), false);
    }
    produce_float(ctx, ty, FloatSet::constant(result), true)
}

/// Evaluate an operation on concrete floats
pub(crate) fn fold_float(
    ctx: &mut EvalContext<'_>,
    op: &Operation,
    ty: FloatType,
    x: f64,
    y: Option<f64>,
) -> bool {
    let operand = || y.unwrap_or_else(|| invariant_violation(format!("{} without its operand", op)));
    match op {
        Operation::Prev => fold_step(ctx, ty, x, ty.next_down(x)),
        Operation::Next => fold_step(ctx, ty, x, ty.next_up(x)),
        Operation::Opposite => produce_float(ctx, ty, FloatSet::constant(-x), true),
        Operation::LogicalNegate => produce_truth_value(ctx, x == 0.0),
        Operation::CastBit => produce_truth_value(ctx, x != 0.0),
        Operation::CastInt { to } => produce_truncation(ctx, *to, &FloatSet::constant(x), true),
        Operation::CastFloat { to } => {
            let result = to.round(x);
            if result == 0.0 && x != 0.0 {
                ctx.set_underflow();
            }
            fold_step(ctx, *to, x, result)
        }
        Operation::LogicalAnd => produce_truth_value(ctx, x != 0.0 && operand() != 0.0),
        Operation::LogicalOr => produce_truth_value(ctx, x != 0.0 || operand() != 0.0),
        _ if op.kind().is_compare() => produce_truth_value(ctx, compare_values(op.kind(), &x, &operand())),
        _ => {
            let y = operand();
            let result = ty.round(arithmetic(op.kind(), x, y));
            match arithmetic_error(op.kind(), x, y, result) {
                None => produce_float(ctx, ty, FloatSet::constant(result), true),
                Some(kind) => {
                    ctx.flag_error(kind, true);
                    if kind == ErrorKind::Underflow {
                        produce_float(ctx, ty, FloatSet::constant(result), true)
                    } else if ctx.stops_on_error() {
                        produce_float(ctx, ty, FloatSet::empty(), true)
                    } else {
                        produce_float(ctx, ty, FloatSet::constant(result), false)
                    }
                }
            }
        }
    }
}

//
// Set evaluation
//

fn hull(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| match acc {
            None => Some((*v, *v)),
            Some((lo, hi)) => Some((lo.min(*v), hi.max(*v))),
        })
}

fn has_zero(range: (f64, f64)) -> bool {
    range.0 <= 0.0 && 0.0 <= range.1
}

fn has_infinity(range: (f64, f64)) -> bool {
    range.0 == NEG_INF || range.1 == INF
}

/// Smallest non-zero magnitude in a range
fn least_magnitude(ty: &FloatType, range: (f64, f64)) -> f64 {
    if has_zero(range) {
        ty.next_up(0.0)
    } else {
        range.0.abs().min(range.1.abs())
    }
}

/// The parts of a divisor range without zero
fn divisor_parts(ty: &FloatType, range: (f64, f64)) -> Vec<(f64, f64)> {
    let tiny = ty.next_up(0.0);
    let mut parts = vec![];
    if range.0 < 0.0 {
        parts.push((range.0, range.1.min(-tiny)));
    }
    if range.1 > 0.0 {
        parts.push((range.0.max(tiny), range.1));
    }
    parts
}

/// Arithmetic over two float sets, flagging the errors some pair of values may raise
fn arithmetic_sets(
    ctx: &mut EvalContext<'_>,
    ty: &FloatType,
    kind: OperationKind,
    a: &FloatSet,
    b: &FloatSet,
) -> FloatSet {
    let nan = a.nan || b.nan;
    let (ra, rb) = match (a.range, b.range) {
        (Some(ra), Some(rb)) => (ra, rb),
        _ => return FloatSet::empty().with_nan(nan),
    };
    let finite = !has_infinity(ra) && !has_infinity(rb);

    let mut invalid = match kind {
        OperationKind::Plus => (ra.1 == INF && rb.0 == NEG_INF) || (ra.0 == NEG_INF && rb.1 == INF),
        OperationKind::Minus => (ra.1 == INF && rb.1 == INF) || (ra.0 == NEG_INF && rb.0 == NEG_INF),
        OperationKind::Times => (has_zero(ra) && has_infinity(rb)) || (has_zero(rb) && has_infinity(ra)),
        OperationKind::Divide => has_infinity(ra) && has_infinity(rb),
        OperationKind::Modulo => has_infinity(ra),
        _ => false,
    };

    let mut divisors = vec![rb];
    if matches!(kind, OperationKind::Divide | OperationKind::Modulo) && has_zero(rb) {
        ctx.flag_error(ErrorKind::DivisionByZero, rb.0 == 0.0 && rb.1 == 0.0);
        if !ctx.stops_on_error() {
            // x / 0 is infinite or NaN, x % 0 is NaN
            return match kind {
                OperationKind::Divide => FloatSet::full(),
                _ => FloatSet::range(ra.0.min(0.0), ra.1.max(0.0)).with_nan(true),
            };
        }
        if has_zero(ra) && kind == OperationKind::Divide {
            invalid = invalid || ra.0 != ra.1;
        }
        divisors = divisor_parts(ty, rb);
    }

    let mut corners = vec![];
    if kind == OperationKind::Modulo {
        for (lo, hi) in &divisors {
            let magnitude = lo.abs().max(hi.abs());
            let r_lo = if ra.0 < 0.0 { ra.0.max(-magnitude) } else { 0.0 };
            let r_hi = if ra.1 > 0.0 { ra.1.min(magnitude) } else { 0.0 };
            corners.push(r_lo);
            corners.push(r_hi);
        }
    } else {
        for (lo, hi) in &divisors {
            for x in [ra.0, ra.1] {
                for y in [*lo, *hi] {
                    corners.push(ty.round(arithmetic(kind, x, y)));
                }
            }
        }
    }

    let range = hull(&corners);
    if invalid {
        ctx.flag_error(ErrorKind::NaN, range.is_none());
    }
    if finite && matches!(kind, OperationKind::Times | OperationKind::Divide) {
        let smallest = match kind {
            OperationKind::Times => least_magnitude(ty, ra) * least_magnitude(ty, rb),
            _ => least_magnitude(ty, ra) / rb.0.abs().max(rb.1.abs()),
        };
        if smallest < ty.min_positive() && !(ra.0 == 0.0 && ra.1 == 0.0) {
            ctx.set_underflow();
        }
    }
    let range = range.and_then(|range| check_overflow(ctx, ty, range, finite));
    FloatSet {
        range,
        nan: nan || (invalid && !ctx.stops_on_error()),
    }
}

/// Min or max of two float sets; NaN loses against any number
fn extremum_sets(kind: OperationKind, a: &FloatSet, b: &FloatSet) -> FloatSet {
    let mut out = FloatSet::empty();
    if let (Some(ra), Some(rb)) = (a.range, b.range) {
        out.range = Some(match kind {
            OperationKind::Min => (ra.0.min(rb.0), ra.1.min(rb.1)),
            _ => (ra.0.max(rb.0), ra.1.max(rb.1)),
        });
    }
    if a.nan {
        out = out.union(&FloatSet { range: b.range, nan: false });
    }
    if b.nan {
        out = out.union(&FloatSet { range: a.range, nan: false });
    }
    out.nan = a.nan && b.nan;
    out
}

fn compare_sets(ctx: &mut EvalContext<'_>, kind: OperationKind, a: &FloatSet, b: &FloatSet) -> bool {
    let (mut may_true, mut may_false) = (false, false);
    let unordered = (a.nan && !b.is_empty()) || (b.nan && !a.is_empty());
    if unordered {
        if kind == OperationKind::CompareDifferent {
            may_true = true;
        } else {
            may_false = true;
        }
    }
    if let (Some(ra), Some(rb)) = (a.range, b.range) {
        match compare_ranges(kind, (&ra.0, &ra.1), (&rb.0, &rb.1)) {
            Some(true) => may_true = true,
            Some(false) => may_false = true,
            None => {
                may_true = true;
                may_false = true;
            }
        }
    }
    produce_bit(ctx, may_true, may_false)
}

fn step_sets(ctx: &mut EvalContext<'_>, ty: FloatType, op: &Operation, a: &FloatSet) -> bool {
    let range = match op {
        Operation::Prev => a.map_range(|v| ty.next_down(v)),
        _ => a.map_range(|v| ty.next_up(v)),
    };
    let finite = a.range.map_or(true, |range| !has_infinity(range));
    let range = range.and_then(|range| check_overflow(ctx, &ty, range, finite));
    produce_float(ctx, ty, FloatSet { range, nan: a.nan }, false)
}

fn cast_sets(ctx: &mut EvalContext<'_>, from: FloatType, to: FloatType, a: &FloatSet) -> bool {
    let narrowing = to.width() < from.width();
    let mut range = a.map_range(|v| to.round(v));
    if narrowing {
        if let Some((lo, hi)) = a.range {
            let threshold = to.next_up(0.0) / 2.0;
            if lo < threshold && hi > -threshold && !(lo == 0.0 && hi == 0.0) {
                ctx.set_underflow();
            }
            range = range.and_then(|range| check_overflow(ctx, &to, range, !has_infinity((lo, hi))));
        }
    }
    produce_float(ctx, to, FloatSet { range, nan: a.nan }, !narrowing)
}

/// Forward transfer over whole float sets, for intervals and tops
pub(crate) fn apply_sets(receiver: &ScalarElement, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
    let ty = match receiver.scalar_type().as_float() {
        Some(ty) => ty,
        None => return false,
    };
    let a = match receiver.float_set() {
        Some(set) => set,
        None => return false,
    };
    let operand = ctx.argument().and_then(|argument| argument.float_set());
    let argument = || {
        operand.unwrap_or_else(|| invariant_violation(format!("{} without a float operand", op)))
    };
    match op {
        Operation::Prev | Operation::Next => step_sets(ctx, ty, op, &a),
        Operation::Opposite => {
            let range = a.map_range(|v| -v);
            produce_float(ctx, ty, FloatSet { range, nan: a.nan }, true)
        }
        Operation::LogicalNegate => {
            let special = a.compare_special(&ty);
            produce_bit(ctx, special.may_be_zero(), special.may_be_nonzero())
        }
        Operation::CastBit => {
            let special = a.compare_special(&ty);
            produce_bit(ctx, special.may_be_nonzero(), special.may_be_zero())
        }
        Operation::CastInt { to } => produce_truncation(ctx, *to, &a, false),
        Operation::CastFloat { to } => cast_sets(ctx, ty, *to, &a),
        Operation::LogicalAnd | Operation::LogicalOr => apply_logical(receiver, op, ctx),
        _ if op.kind().is_compare() => {
            let b = argument();
            compare_sets(ctx, op.kind(), &a, &b)
        }
        Operation::Min | Operation::Max => {
            let b = argument();
            produce_float(ctx, ty, extremum_sets(op.kind(), &a, &b), false)
        }
        Operation::Plus
        | Operation::Minus
        | Operation::Times
        | Operation::Divide
        | Operation::Modulo => {
            let b = argument();
            let set = arithmetic_sets(ctx, &ty, op.kind(), &a, &b);
            produce_float(ctx, ty, set, false)
        }
        _ => invariant_violation(format!("{} on floats", op)),
    }
}

//
// Elements
//

/// A known float, possibly NaN or a signed zero
#[derive(Clone, Copy, Debug)]
pub struct FloatConstant {
    ty: FloatType,
    value: f64,
}

impl PartialEq for FloatConstant {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty
            && (self.value.to_bits() == other.value.to_bits()
                || (self.value.is_nan() && other.value.is_nan()))
    }
}

impl FloatConstant {
    /// `value` must already be a value of `ty`
    pub(crate) fn new(ty: FloatType, value: f64) -> Self {
        Self { ty, value }
    }

    pub fn ty(&self) -> &FloatType {
        &self.ty
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    fn apply_fold(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let argument = match ctx.argument() {
            None => None,
            Some(ScalarElement::Float(argument)) => Some(argument.value),
            Some(_) => return false,
        };
        fold_float(ctx, op, self.ty, self.value, argument)
    }

    fn apply_general(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        apply_sets(&ScalarElement::Float(*self), op, ctx)
    }
}

impl AbstractDomain for FloatConstant {
    const PRECISION: PrecisionKind = PrecisionKind::Constant;

    fn scalar_type(&self) -> ScalarType {
        ScalarType::Float(self.ty)
    }

    fn merge(&self, other: &ScalarElement) -> Option<ScalarElement> {
        match other {
            ScalarElement::Float(o) if o == self => Some(other.clone()),
            ScalarElement::Float(o) => {
                let set = FloatSet::constant(self.value).union(&FloatSet::constant(o.value));
                ScalarElement::from_float_set(self.ty, &set)
            }
            _ => None,
        }
    }

    fn intersect(&self, other: &ScalarElement) -> Option<Meet> {
        match other {
            ScalarElement::Float(o) if o == self => Some(Meet::Element(other.clone())),
            ScalarElement::Float(_) => Some(Meet::Bottom),
            _ => None,
        }
    }

    fn contain(&self, other: &ScalarElement) -> Option<bool> {
        match other {
            ScalarElement::Float(o) => Some(o == self),
            _ => None,
        }
    }

    fn contain_to(&self, source: &ScalarElement) -> Option<bool> {
        self.contain(source)
    }

    fn compare_special(&self) -> CompareSpecial {
        CompareSpecial::of_float(&self.ty, self.value)
    }
}

/// The floats `[lo, hi]` of a type, without NaN
///
/// Like integer intervals, a singleton only exists as the promotion of a constant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FloatInterval {
    ty: FloatType,
    lo: f64,
    hi: f64,
}

impl FloatInterval {
    pub(crate) fn new(ty: FloatType, lo: f64, hi: f64) -> Self {
        if lo.is_nan() || hi.is_nan() || lo > hi {
            invariant_violation(format!("malformed float interval [{}, {}]", lo, hi));
        }
        Self { ty, lo, hi }
    }

    pub fn ty(&self) -> &FloatType {
        &self.ty
    }

    pub fn lo(&self) -> f64 {
        self.lo
    }

    pub fn hi(&self) -> f64 {
        self.hi
    }

    fn set(&self) -> FloatSet {
        FloatSet::range(self.lo, self.hi)
    }
}

impl AbstractDomain for FloatInterval {
    const PRECISION: PrecisionKind = PrecisionKind::Interval;

    fn scalar_type(&self) -> ScalarType {
        ScalarType::Float(self.ty)
    }

    fn merge(&self, other: &ScalarElement) -> Option<ScalarElement> {
        match other {
            ScalarElement::Float(_) | ScalarElement::FloatInterval(_) => {
                ScalarElement::from_float_set(self.ty, &self.set().union(&other.float_set()?))
            }
            _ => None,
        }
    }

    fn intersect(&self, other: &ScalarElement) -> Option<Meet> {
        match other {
            // a signed zero stays itself inside a range holding zero
            ScalarElement::Float(o) if self.set().contains(o.value) => {
                Some(Meet::Element(other.clone()))
            }
            ScalarElement::Float(_) => Some(Meet::Bottom),
            ScalarElement::FloatInterval(o) => {
                let met = self.set().meet(&o.set());
                Some(match ScalarElement::from_float_set(self.ty, &met) {
                    None => Meet::Bottom,
                    Some(element) => Meet::Element(element),
                })
            }
            _ => None,
        }
    }

    fn contain(&self, other: &ScalarElement) -> Option<bool> {
        match other {
            ScalarElement::Float(_) | ScalarElement::FloatInterval(_) => {
                Some(self.set().includes(&other.float_set()?))
            }
            _ => None,
        }
    }

    fn contain_to(&self, source: &ScalarElement) -> Option<bool> {
        match source {
            ScalarElement::Float(_) | ScalarElement::FloatInterval(_) => {
                Some(source.float_set()?.includes(&self.set()))
            }
            _ => None,
        }
    }

    fn compare_special(&self) -> CompareSpecial {
        CompareSpecial::of_float_range(&self.ty, self.lo, self.hi)
    }
}

fn float_kinds() -> Vec<OperationKind> {
    let mut kinds = FLOAT_UNARY.to_vec();
    kinds.extend_from_slice(&OperationKind::ALL[COMPARE_START..BINARY_START]);
    kinds.extend_from_slice(&FLOAT_BINARY);
    kinds
}

fn build_constant_apply() -> MethodTable<ApplyHandler<FloatConstant>> {
    let mut table: MethodTable<ApplyHandler<FloatConstant>> = MethodTable::new();
    for kind in float_kinds() {
        let handler = if kind.is_unary() {
            Handler::Bound(FloatConstant::apply_fold as ApplyFn<FloatConstant>)
        } else {
            Handler::Specialized {
                constant: FloatConstant::apply_fold as ApplyFn<FloatConstant>,
                general: FloatConstant::apply_general as ApplyFn<FloatConstant>,
            }
        };
        table.bind(kind, handler);
    }
    table
}

fn build_interval_apply() -> MethodTable<ApplyHandler<FloatInterval>> {
    let mut table: MethodTable<ApplyHandler<FloatInterval>> = MethodTable::new();
    table.bind_all(&float_kinds(), Handler::Generic(apply_sets));
    table
}

fn build_constraint_table<E>() -> MethodTable<ConstraintHandler<E>> {
    let mut table: MethodTable<ConstraintHandler<E>> = MethodTable::new();
    table.bind_all(&float_kinds(), Handler::Generic(floating::constrain));
    table
}

lazy_static! {
    pub static ref CONSTANT_APPLY: MethodTable<ApplyHandler<FloatConstant>> =
        build_constant_apply();
    pub static ref CONSTANT_CONSTRAINT: MethodTable<ConstraintHandler<FloatConstant>> =
        build_constraint_table();
    pub static ref CONSTANT_QUERY: QueryTable = query::float_table();
    pub static ref INTERVAL_APPLY: MethodTable<ApplyHandler<FloatInterval>> =
        build_interval_apply();
    pub static ref INTERVAL_CONSTRAINT: MethodTable<ConstraintHandler<FloatInterval>> =
        build_constraint_table();
    pub static ref INTERVAL_QUERY: QueryTable = query::float_table();
}
