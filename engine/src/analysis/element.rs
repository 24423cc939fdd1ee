use std::fmt::{Display, Formatter};

use log::{debug, trace};
use num_bigint::BigInt;
use num_traits::{One, Zero};

use libra_shared::config::DISJUNCTION_LIMIT;
use libra_shared::logging::Tracer;

use crate::analysis::bits::{self, BitConstant};
use crate::analysis::constant::{self, IntConstant};
use crate::analysis::context::{Argument, ConstraintContext, EvalContext};
use crate::analysis::disjunction::{self, Disjunction};
use crate::analysis::dispatch::{invoke_apply, invoke_constraint};
use crate::analysis::float::{self, FloatConstant, FloatInterval, FloatSet};
use crate::analysis::generic::{AbstractDomain, Meet};
use crate::analysis::lattice::PrecisionKind;
use crate::analysis::query::{self, Query, QueryAnswer, Truthiness};
use crate::analysis::range::{self, IntInterval};
use crate::analysis::sign::CompareSpecial;
use crate::analysis::top::{self, Top};
use crate::error::{invariant_violation, EngineError, EngineResult};
use crate::ir::operation::Operation;
use crate::ir::typing::{FloatType, IntType, ScalarType};

/// A concrete scalar value
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarValue {
    Bit(bool),
    Int(BigInt),
    Float(f64),
}

/// An abstract scalar: a set of possible values of one scalar type
///
/// Elements are values: operations never mutate their receiver and deliver what they compute
/// through the context.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarElement {
    Bit(BitConstant),
    Int(IntConstant),
    Float(FloatConstant),
    IntInterval(IntInterval),
    FloatInterval(FloatInterval),
    Disjunction(Disjunction),
    Top(Top),
}

macro_rules! each_kind {
    ($element:expr, $inner:ident => $body:expr) => {
        match $element {
            ScalarElement::Bit($inner) => $body,
            ScalarElement::Int($inner) => $body,
            ScalarElement::Float($inner) => $body,
            ScalarElement::IntInterval($inner) => $body,
            ScalarElement::FloatInterval($inner) => $body,
            ScalarElement::Disjunction($inner) => $body,
            ScalarElement::Top($inner) => $body,
        }
    };
}

//
// Construction
//

impl ScalarElement {
    pub fn bit(value: bool) -> Self {
        Self::Bit(BitConstant::new(value))
    }

    pub fn int<V: Into<BigInt>>(ty: IntType, value: V) -> EngineResult<Self> {
        let value = value.into();
        if !ty.contains(&value) {
            return Err(EngineError::InvalidOperation(format!(
                "constant {} out of range for {}",
                value, ty
            )));
        }
        Ok(Self::Int(IntConstant::new(ty, value)))
    }

    /// A float constant, rounded to the type
    pub fn float(ty: FloatType, value: f64) -> Self {
        Self::Float(FloatConstant::new(ty, ty.round(value)))
    }

    /// The values `[lo, hi]`, collapsed to a constant when there is only one
    pub fn int_range<V: Into<BigInt>>(ty: IntType, lo: V, hi: V) -> EngineResult<Self> {
        let (lo, hi) = (lo.into(), hi.into());
        if lo > hi || !ty.contains(&lo) || !ty.contains(&hi) {
            return Err(EngineError::InvalidOperation(format!(
                "invalid range [{}, {}] for {}",
                lo, hi, ty
            )));
        }
        Ok(Self::from_int_range(ScalarType::Int(ty), lo, hi))
    }

    /// The floats `[lo, hi]` (NaN excluded), collapsed to a constant when `lo == hi`
    pub fn float_range(ty: FloatType, lo: f64, hi: f64) -> EngineResult<Self> {
        if lo.is_nan() || hi.is_nan() || lo > hi {
            return Err(EngineError::InvalidOperation(format!(
                "invalid range [{}, {}] for {}",
                lo, hi, ty
            )));
        }
        let set = FloatSet::range(ty.round(lo), ty.round(hi));
        Ok(Self::from_float_set(ty, &set).unwrap_or_else(|| Self::top(ScalarType::Float(ty))))
    }

    /// A set of integer constants, at most the configured disjunction limit
    pub fn disjunction<I: IntoIterator<Item = BigInt>>(ty: IntType, values: I) -> EngineResult<Self> {
        let mut values: Vec<BigInt> = values.into_iter().collect();
        values.sort();
        values.dedup();
        if values.is_empty() || values.len() > *DISJUNCTION_LIMIT {
            return Err(EngineError::InvalidOperation(format!(
                "a disjunction holds 1 to {} values, got {}",
                *DISJUNCTION_LIMIT,
                values.len()
            )));
        }
        if let Some(value) = values.iter().find(|v| !ty.contains(v)) {
            return Err(EngineError::InvalidOperation(format!(
                "constant {} out of range for {}",
                value, ty
            )));
        }
        Ok(Self::from_int_values(ScalarType::Int(ty), values))
    }

    pub fn top(ty: ScalarType) -> Self {
        Self::Top(Top::new(ty))
    }

    /// A constant of the given type
    pub fn constant(ty: ScalarType, value: ScalarValue) -> EngineResult<Self> {
        match (ty, value) {
            (ScalarType::Bit, ScalarValue::Bit(v)) => Ok(Self::bit(v)),
            (ScalarType::Int(int), ScalarValue::Int(v)) => Self::int(int, v),
            (ScalarType::Float(float), ScalarValue::Float(v)) => Ok(Self::float(float, v)),
            (ty, value) => Err(EngineError::InvalidOperation(format!(
                "value {:?} is not of type {}",
                value, ty
            ))),
        }
    }

    /// A constant of a bit or integer type, from its value in the integer view
    pub(crate) fn int_constant_of(ty: ScalarType, value: BigInt) -> Self {
        match ty {
            ScalarType::Bit => Self::bit(!value.is_zero()),
            ScalarType::Int(int) => Self::Int(IntConstant::new(int, value)),
            ScalarType::Float(_) => invariant_violation("integer constant of a float type"),
        }
    }

    /// The values `[lo, hi]` of a bit or integer type (`lo <= hi`, both in range)
    pub(crate) fn from_int_range(ty: ScalarType, lo: BigInt, hi: BigInt) -> Self {
        if lo == hi {
            return Self::int_constant_of(ty, lo);
        }
        match ty {
            ScalarType::Bit => Self::top(ty),
            ScalarType::Int(int) => Self::IntInterval(IntInterval::new(int, lo, hi)),
            ScalarType::Float(_) => invariant_violation("integer range of a float type"),
        }
    }

    /// A non-empty set of values of a bit or integer type, widened to their hull past the limit
    pub(crate) fn from_int_values(ty: ScalarType, mut values: Vec<BigInt>) -> Self {
        values.sort();
        values.dedup();
        let (lo, hi) = match (values.first(), values.last()) {
            (Some(lo), Some(hi)) => (lo.clone(), hi.clone()),
            _ => invariant_violation("building an element from no value"),
        };
        match ty {
            ScalarType::Int(int) if values.len() > 1 && values.len() <= *DISJUNCTION_LIMIT => {
                Self::Disjunction(Disjunction::new(int, values))
            }
            _ => Self::from_int_range(ty, lo, hi),
        }
    }

    /// The element of a non-empty float set
    pub(crate) fn from_float_set(ty: FloatType, set: &FloatSet) -> Option<Self> {
        match (set.bounds(), set.may_be_nan()) {
            (None, false) => None,
            (None, true) => Some(Self::Float(FloatConstant::new(ty, f64::NAN))),
            (Some(_), true) => Some(Self::top(ScalarType::Float(ty))),
            (Some((lo, hi)), false) if lo.to_bits() == hi.to_bits() => {
                Some(Self::Float(FloatConstant::new(ty, lo)))
            }
            (Some((lo, hi)), false) => Some(Self::FloatInterval(FloatInterval::new(ty, lo, hi))),
        }
    }
}

//
// Inspection
//

impl ScalarElement {
    pub fn precision(&self) -> PrecisionKind {
        match self {
            Self::Bit(_) => BitConstant::PRECISION,
            Self::Int(_) => IntConstant::PRECISION,
            Self::Float(_) => FloatConstant::PRECISION,
            Self::IntInterval(_) => IntInterval::PRECISION,
            Self::FloatInterval(_) => FloatInterval::PRECISION,
            Self::Disjunction(_) => Disjunction::PRECISION,
            Self::Top(_) => Top::PRECISION,
        }
    }

    pub fn scalar_type(&self) -> ScalarType {
        each_kind!(self, e => e.scalar_type())
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bit(_) => "bit-constant",
            Self::Int(_) => "int-constant",
            Self::Float(_) => "float-constant",
            Self::IntInterval(_) => "int-interval",
            Self::FloatInterval(_) => "float-interval",
            Self::Disjunction(_) => "disjunction",
            Self::Top(_) => "top",
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Self::Bit(_) | Self::Int(_) | Self::Float(_))
    }

    pub fn is_top(&self) -> bool {
        matches!(self, Self::Top(_))
    }

    pub fn constant_value(&self) -> Option<ScalarValue> {
        match self {
            Self::Bit(e) => Some(ScalarValue::Bit(e.value())),
            Self::Int(e) => Some(ScalarValue::Int(e.value().clone())),
            Self::Float(e) => Some(ScalarValue::Float(e.value())),
            _ => None,
        }
    }

    /// The value of a bit or integer constant in the integer view
    pub fn int_constant(&self) -> Option<BigInt> {
        match self {
            Self::Bit(e) => Some(BigInt::from(e.value() as u8)),
            Self::Int(e) => Some(e.value().clone()),
            _ => None,
        }
    }

    /// Hull of a bit or integer element in the integer view
    pub fn int_bounds(&self) -> Option<(IntType, BigInt, BigInt)> {
        match self {
            Self::Bit(e) => {
                let value = BigInt::from(e.value() as u8);
                Some((IntType::bit_view(), value.clone(), value))
            }
            Self::Int(e) => Some((*e.ty(), e.value().clone(), e.value().clone())),
            Self::IntInterval(e) => Some((*e.ty(), e.lo().clone(), e.hi().clone())),
            Self::Disjunction(e) => Some((*e.ty(), e.min().clone(), e.max().clone())),
            Self::Top(e) => {
                let ty = e.ty().bits_view()?;
                Some((ty, ty.min_value(), ty.max_value()))
            }
            Self::Float(_) | Self::FloatInterval(_) => None,
        }
    }

    /// Every value of a bit or integer element, when there are only a few
    pub fn int_values(&self) -> Option<Vec<BigInt>> {
        match self {
            Self::Disjunction(e) => Some(e.values().to_vec()),
            Self::Top(e) if e.ty() == ScalarType::Bit => Some(vec![BigInt::zero(), BigInt::one()]),
            _ => self.int_constant().map(|value| vec![value]),
        }
    }

    /// Members of an enumerable element, as constants
    pub fn members(&self) -> Option<Vec<ScalarElement>> {
        let ty = self.scalar_type();
        match self {
            Self::Bit(_) | Self::Int(_) | Self::Float(_) => Some(vec![self.clone()]),
            _ => self.int_values().map(|values| {
                values
                    .into_iter()
                    .map(|value| Self::int_constant_of(ty, value))
                    .collect()
            }),
        }
    }

    /// Value set of a float element
    pub fn float_set(&self) -> Option<FloatSet> {
        match self {
            Self::Float(e) => Some(FloatSet::constant(e.value())),
            Self::FloatInterval(e) => Some(FloatSet::range(e.lo(), e.hi())),
            Self::Top(e) if e.ty().as_float().is_some() => Some(FloatSet::full()),
            _ => None,
        }
    }

    pub fn contains_int(&self, value: &BigInt) -> bool {
        match self {
            Self::Disjunction(e) => e.contains(value),
            _ => self
                .int_bounds()
                .map_or(false, |(_, lo, hi)| &lo <= value && value <= &hi),
        }
    }

    /// Number of values of a bit or integer element
    pub fn cardinality(&self) -> Option<BigInt> {
        match self {
            Self::Disjunction(e) => Some(BigInt::from(e.values().len())),
            _ => self.int_bounds().map(|(_, lo, hi)| hi - lo + 1),
        }
    }

    pub fn compare_special(&self) -> CompareSpecial {
        each_kind!(self, e => e.compare_special())
    }

    pub fn truthiness(&self) -> Truthiness {
        let special = self.compare_special();
        if special.is_zero() {
            Truthiness::False
        } else if special.is_nonzero() {
            Truthiness::True
        } else {
            Truthiness::Undecided
        }
    }
}

//
// Forward transfer
//

impl ScalarElement {
    fn expect_types(&self, op: &Operation, argument: Option<&ScalarElement>) -> ScalarType {
        if op.arity() == 1 && argument.is_none() {
            invariant_violation(format!("{} applied without its operand", op));
        }
        match op.result_type(self.scalar_type(), argument.map(|a| a.scalar_type())) {
            Ok(ty) => ty,
            Err(e) => invariant_violation(e.to_string()),
        }
    }

    /// Forward transfer: the abstract result of `op` goes to the context
    ///
    /// Returns `false` when no rung of the re-dispatch ladder supports the operation.
    pub fn apply(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let result_ty = self.expect_types(op, ctx.argument());
        let tracer = Tracer::new(|| format!("apply {} on {}", op, self));

        if ctx.is_depth_exceeded() {
            debug!("depth {} exhausted, {} coarsened to top", ctx.depth(), op);
            ctx.set_result(Self::top(result_ty));
            ctx.merge_verdict_degradate();
            return true;
        }

        let handled = self.apply_local(op, ctx) || self.apply_promoted(op, ctx);
        if handled && !op.is_const() {
            if let Some(result) = ctx.result() {
                if result.precision() != self.precision() {
                    ctx.set_unstable();
                }
            }
        }
        tracer.log(|| match ctx.result() {
            Some(result) => format!("{:?} {}", ctx.verdict(), result),
            None if ctx.is_empty() => "empty".to_string(),
            None => format!("{:?}", ctx.verdict()),
        });
        handled
    }

    /// Forward transfer of an operation that must be supported
    pub fn require_apply(&self, op: &Operation, ctx: &mut EvalContext<'_>) {
        if !self.apply(op, ctx) {
            invariant_violation(format!("{} is not wired for {}", op, self.kind_name()));
        }
    }

    fn apply_local(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        match self {
            Self::Bit(e) => invoke_apply(&*bits::APPLY, e, self, op, ctx),
            Self::Int(e) => invoke_apply(&*constant::APPLY, e, self, op, ctx),
            Self::Float(e) => invoke_apply(&*float::CONSTANT_APPLY, e, self, op, ctx),
            Self::IntInterval(e) => invoke_apply(&*range::APPLY, e, self, op, ctx),
            Self::FloatInterval(e) => invoke_apply(&*float::INTERVAL_APPLY, e, self, op, ctx),
            Self::Disjunction(e) => invoke_apply(&*disjunction::APPLY, e, self, op, ctx),
            Self::Top(e) => invoke_apply(&*top::APPLY, e, self, op, ctx),
        }
    }

    /// The next coarser shape able to carry out what this one declined
    fn promote(&self) -> Option<ScalarElement> {
        match self {
            Self::Int(e) => Some(Self::IntInterval(IntInterval::new(
                *e.ty(),
                e.value().clone(),
                e.value().clone(),
            ))),
            Self::Float(e) if e.value().is_nan() => Some(Self::top(self.scalar_type())),
            Self::Float(e) => Some(Self::FloatInterval(FloatInterval::new(
                *e.ty(),
                e.value(),
                e.value(),
            ))),
            Self::FloatInterval(_) => Some(Self::top(self.scalar_type())),
            Self::Top(e) => e.ty().as_int().map(|ty| Self::IntInterval(IntInterval::full(ty))),
            Self::Bit(_) | Self::IntInterval(_) | Self::Disjunction(_) => None,
        }
    }

    fn apply_promoted(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        let promoted = match self.promote() {
            None => return false,
            Some(promoted) => promoted,
        };
        trace!("re-dispatch {} from {} to {}", op, self.kind_name(), promoted.kind_name());
        let argument = ctx.argument();
        let handled = ctx.with_child(argument, |child| promoted.apply(op, child));
        ctx.seal_join();
        handled
    }
}

//
// Backward refinement
//

impl ScalarElement {
    fn expect_constraint_types(&self, op: &Operation, ctx: &ConstraintContext<'_>, result: &Self) {
        let (first, second) = ctx.operands(self);
        let ty = first.expect_types(op, second);
        if ty != result.scalar_type() {
            invariant_violation(format!(
                "{} produces {}, constrained to {}",
                op,
                ty,
                result.scalar_type()
            ));
        }
    }

    /// Backward refinement with this element as first operand and the context holding the
    /// second one; refined operands are left in the context
    pub fn constraint(
        &self,
        op: &Operation,
        result: &ScalarElement,
        ctx: &mut ConstraintContext<'_>,
    ) -> bool {
        ctx.select(Argument::First);
        self.expect_constraint_types(op, ctx, result);
        self.constrain_as(op, result, ctx)
    }

    /// Backward refinement with this element as second operand and `source` as first
    pub fn constraint_to<'a>(
        &self,
        op: &Operation,
        source: &'a ScalarElement,
        result: &ScalarElement,
        ctx: &mut ConstraintContext<'a>,
    ) -> bool {
        ctx.bind_argument(source);
        ctx.select(Argument::Second);
        self.expect_constraint_types(op, ctx, result);
        self.constrain_as(op, result, ctx)
    }

    /// Backward refinement of an operation that must be supported
    pub fn require_constraint(
        &self,
        op: &Operation,
        result: &ScalarElement,
        ctx: &mut ConstraintContext<'_>,
    ) {
        if !self.constraint(op, result, ctx) {
            invariant_violation(format!(
                "constraint {} is not wired for {}",
                op,
                self.kind_name()
            ));
        }
    }

    /// Refine in the role given by the context selector
    pub(crate) fn constrain_as(
        &self,
        op: &Operation,
        result: &ScalarElement,
        ctx: &mut ConstraintContext<'_>,
    ) -> bool {
        let _tracer = Tracer::new(|| format!("constraint {} on {} to {}", op, self, result));

        if ctx.is_depth_exceeded() {
            debug!("depth {} exhausted, {} left unconstrained", ctx.depth(), op);
            ctx.merge_verdict_degradate();
            return true;
        }
        if self.constrain_local(op, result, ctx) {
            return true;
        }

        // let the other operand drive
        if let Some(other) = ctx.argument() {
            let mut child = ctx.fork(Some(self), ctx.selector().inverse());
            if other.constrain_local(op, result, &mut child) {
                trace!("re-dispatch constraint {} to {}", op, other.kind_name());
                ctx.absorb(child);
                return true;
            }
        }
        false
    }

    fn constrain_local(
        &self,
        op: &Operation,
        result: &ScalarElement,
        ctx: &mut ConstraintContext<'_>,
    ) -> bool {
        match self {
            Self::Bit(e) => invoke_constraint(&*bits::CONSTRAINT, e, self, op, result, ctx),
            Self::Int(e) => invoke_constraint(&*constant::CONSTRAINT, e, self, op, result, ctx),
            Self::Float(e) => {
                invoke_constraint(&*float::CONSTANT_CONSTRAINT, e, self, op, result, ctx)
            }
            Self::IntInterval(e) => {
                invoke_constraint(&*range::CONSTRAINT, e, self, op, result, ctx)
            }
            Self::FloatInterval(e) => {
                invoke_constraint(&*float::INTERVAL_CONSTRAINT, e, self, op, result, ctx)
            }
            Self::Disjunction(e) => {
                invoke_constraint(&*disjunction::CONSTRAINT, e, self, op, result, ctx)
            }
            Self::Top(e) => invoke_constraint(&*top::CONSTRAINT, e, self, op, result, ctx),
        }
    }
}

//
// Lattice operations
//

impl ScalarElement {
    fn expect_same_type(&self, other: &Self, operation: &str) {
        if self.scalar_type() != other.scalar_type() {
            invariant_violation(format!(
                "{} between {} and {}",
                operation,
                self.scalar_type(),
                other.scalar_type()
            ));
        }
    }

    fn merge_local(&self, other: &Self) -> Option<Self> {
        each_kind!(self, e => e.merge(other))
    }

    fn intersect_local(&self, other: &Self) -> Option<Meet> {
        each_kind!(self, e => e.intersect(other))
    }

    fn contain_local(&self, other: &Self) -> Option<bool> {
        each_kind!(self, e => e.contain(other))
    }

    fn contain_to_local(&self, source: &Self) -> Option<bool> {
        each_kind!(self, e => e.contain_to(source))
    }

    fn drives(&self, other: &Self) -> bool {
        self.precision().rank_cmp(other.precision()).is_ge()
    }

    /// Join, run by the coarser-or-equal operand
    pub fn join(&self, other: &Self) -> Self {
        self.expect_same_type(other, "join");
        let joined = if self.drives(other) {
            self.merge_local(other).or_else(|| other.merge_local(self))
        } else {
            other.merge_local(self).or_else(|| self.merge_local(other))
        };
        joined.unwrap_or_else(|| {
            invariant_violation(format!(
                "no join between {} and {}",
                self.kind_name(),
                other.kind_name()
            ))
        })
    }

    /// Meet, run by the coarser-or-equal operand
    pub fn meet(&self, other: &Self) -> Meet {
        self.expect_same_type(other, "meet");
        let met = if self.drives(other) {
            self.intersect_local(other).or_else(|| other.intersect_local(self))
        } else {
            other.intersect_local(self).or_else(|| self.intersect_local(other))
        };
        met.unwrap_or_else(|| {
            invariant_violation(format!(
                "no meet between {} and {}",
                self.kind_name(),
                other.kind_name()
            ))
        })
    }

    /// Whether every value of `other` is a value of this element
    pub fn contains(&self, other: &Self) -> bool {
        self.expect_same_type(other, "containment");
        let answer = if self.drives(other) {
            self.contain_local(other).or_else(|| other.contain_to_local(self))
        } else {
            other.contain_to_local(self).or_else(|| self.contain_local(other))
        };
        answer.unwrap_or_else(|| {
            invariant_violation(format!(
                "no containment between {} and {}",
                self.kind_name(),
                other.kind_name()
            ))
        })
    }

    /// Whether the join loses no precision over the union of both operands
    pub(crate) fn is_exact_join(&self, other: &Self, joined: &Self) -> bool {
        if joined == self || joined == other {
            return true;
        }
        match (self.cardinality(), other.cardinality(), joined.cardinality()) {
            (Some(lhs), Some(rhs), Some(total)) => {
                let common = match self.meet(other) {
                    Meet::Bottom => BigInt::zero(),
                    Meet::Element(e) => e.cardinality().unwrap_or_else(BigInt::zero),
                };
                total == lhs + rhs - common
            }
            _ => match (self.float_set(), other.float_set()) {
                (Some(lhs), Some(rhs)) => lhs.touches(&rhs) && !joined.is_top(),
                _ => false,
            },
        }
    }

    fn finish_join(&self, joined: Self, exact: bool, ctx: &mut EvalContext<'_>) -> bool {
        ctx.merge_verdict(exact);
        if joined.precision() != self.precision() {
            ctx.set_unstable();
        }
        ctx.set_result(joined);
        true
    }

    /// Join into the context result
    pub fn merge_with(&self, other: &Self, ctx: &mut EvalContext<'_>) -> bool {
        let joined = self.join(other);
        let exact = self.is_exact_join(other, &joined);
        self.finish_join(joined, exact, ctx)
    }

    /// Join asked by a finer `source` of this coarser element
    pub fn merge_with_to(&self, source: &Self, ctx: &mut EvalContext<'_>) -> bool {
        let joined = self.join(source);
        let exact = self.is_exact_join(source, &joined);
        source.finish_join(joined, exact, ctx)
    }

    /// Meet into the context result; no common value makes the context empty
    pub fn intersect_with(&self, other: &Self, ctx: &mut EvalContext<'_>) -> bool {
        match self.meet(other) {
            Meet::Bottom => ctx.set_empty(),
            Meet::Element(e) => ctx.set_result(e),
        }
        ctx.merge_verdict_exact();
        true
    }

    /// Meet asked by a finer `source` of this coarser element
    pub fn intersect_with_to(&self, source: &Self, ctx: &mut EvalContext<'_>) -> bool {
        source.intersect_with(self, ctx)
    }

    /// Subsumption: every value of `other` is a value of this element
    pub fn contain(&self, other: &Self, ctx: &mut EvalContext<'_>) -> bool {
        let answer = self.contains(other);
        ctx.merge_verdict_exact();
        answer
    }

    /// Subsumption asked by a finer `source`: every value of this element is one of `source`
    pub fn contain_to(&self, source: &Self, ctx: &mut EvalContext<'_>) -> bool {
        source.contain(self, ctx)
    }
}

//
// Guard and queries
//

impl ScalarElement {
    /// Select a branch by the truth of this element; absent branches are unreachable
    pub fn guard(
        &self,
        then: Option<&ScalarElement>,
        otherwise: Option<&ScalarElement>,
        ctx: &mut EvalContext<'_>,
    ) -> bool {
        let branches = match self.truthiness() {
            Truthiness::True => vec![then],
            Truthiness::False => vec![otherwise],
            Truthiness::Undecided => vec![then, otherwise],
        };
        let mut present = branches.into_iter().flatten();
        match present.next() {
            None => {
                ctx.set_empty();
                ctx.merge_verdict_exact();
            }
            Some(first) => match present.next() {
                None => {
                    ctx.set_result(first.clone());
                    ctx.merge_verdict_exact();
                }
                Some(second) => {
                    let joined = first.join(second);
                    ctx.merge_verdict(first.is_exact_join(second, &joined));
                    ctx.set_result(joined);
                }
            },
        }
        true
    }

    /// Answer a query through the table of this element kind
    pub fn query(&self, query: &Query) -> EngineResult<QueryAnswer> {
        let table = match self {
            Self::Bit(_) => &*bits::QUERY,
            Self::Int(_) => &*constant::QUERY,
            Self::Float(_) => &*float::CONSTANT_QUERY,
            Self::IntInterval(_) => &*range::QUERY,
            Self::FloatInterval(_) => &*float::INTERVAL_QUERY,
            Self::Disjunction(_) => &*disjunction::QUERY,
            Self::Top(_) => &*top::QUERY,
        };
        match table.get(query) {
            Some(handler) => handler(self, query),
            None => {
                debug!("unsupported query {} on {}", query.name(), self.kind_name());
                Err(query::unsupported(self, query))
            }
        }
    }
}

impl Display for ScalarElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bit(e) => write!(f, "{}", e.value()),
            Self::Int(e) => write!(f, "{}:{}", e.value(), e.ty()),
            Self::Float(e) => write!(f, "{}:{}", e.value(), e.ty()),
            Self::IntInterval(e) => write!(f, "[{}, {}]:{}", e.lo(), e.hi(), e.ty()),
            Self::FloatInterval(e) => write!(f, "[{}, {}]:{}", e.lo(), e.hi(), e.ty()),
            Self::Disjunction(e) => {
                let values: Vec<String> = e.values().iter().map(|v| v.to_string()).collect();
                write!(f, "{{{}}}:{}", values.join(", "), e.ty())
            }
            Self::Top(e) => write!(f, "T:{}", e.ty()),
        }
    }
}
