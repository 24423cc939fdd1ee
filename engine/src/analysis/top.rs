use lazy_static::lazy_static;
use num_bigint::BigInt;

use crate::analysis::context::{ConstraintContext, EvalContext};
use crate::analysis::disjunction;
use crate::analysis::dispatch::{ApplyHandler, ConstraintHandler, Handler, MethodTable, QueryTable};
use crate::analysis::element::ScalarElement;
use crate::analysis::float;
use crate::analysis::generic::{AbstractDomain, Meet};
use crate::analysis::lattice::PrecisionKind;
use crate::analysis::propagate;
use crate::analysis::query;
use crate::analysis::range::IntInterval;
use crate::analysis::sign::CompareSpecial;
use crate::ir::operation::{Operation, OperationKind};
use crate::ir::typing::ScalarType;

/// Every value of a type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Top {
    ty: ScalarType,
}

impl Top {
    pub fn new(ty: ScalarType) -> Self {
        Self { ty }
    }

    pub fn ty(&self) -> ScalarType {
        self.ty
    }

    fn bits() -> [ScalarElement; 2] {
        [ScalarElement::bit(false), ScalarElement::bit(true)]
    }

    /// Bits split into both values, integers go through the full interval
    fn apply_top(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        match self.ty {
            ScalarType::Bit => disjunction::apply_members(&Self::bits(), op, ctx),
            ScalarType::Int(_) => false,
            ScalarType::Float(_) => float::apply_sets(&ScalarElement::Top(*self), op, ctx),
        }
    }

    fn constrain_top(
        &self,
        op: &Operation,
        result: &ScalarElement,
        ctx: &mut ConstraintContext<'_>,
    ) -> bool {
        let whole = ScalarElement::Top(*self);
        match self.ty {
            ScalarType::Bit => propagate::constrain_by_enumeration(&whole, op, result, ctx),
            ScalarType::Int(ty) => {
                ScalarElement::IntInterval(IntInterval::full(ty)).constrain_as(op, result, ctx)
            }
            ScalarType::Float(_) => propagate::floating::constrain(&whole, op, result, ctx),
        }
    }

    /// Whether the finer `source` holds every value of the type
    fn is_covered_by(&self, source: &ScalarElement) -> bool {
        match source {
            ScalarElement::Top(_) => true,
            ScalarElement::IntInterval(e) => e.is_full(),
            ScalarElement::Disjunction(e) => BigInt::from(e.values().len()) == e.ty().modulus(),
            _ => false,
        }
    }
}

impl AbstractDomain for Top {
    const PRECISION: PrecisionKind = PrecisionKind::Top;

    fn scalar_type(&self) -> ScalarType {
        self.ty
    }

    fn merge(&self, _other: &ScalarElement) -> Option<ScalarElement> {
        Some(ScalarElement::Top(*self))
    }

    fn intersect(&self, other: &ScalarElement) -> Option<Meet> {
        Some(Meet::Element(other.clone()))
    }

    fn contain(&self, _other: &ScalarElement) -> Option<bool> {
        Some(true)
    }

    fn contain_to(&self, source: &ScalarElement) -> Option<bool> {
        Some(self.is_covered_by(source))
    }

    fn compare_special(&self) -> CompareSpecial {
        match &self.ty {
            ScalarType::Bit => CompareSpecial::of_bit(false).join(&CompareSpecial::of_bit(true)),
            ScalarType::Int(ty) => {
                CompareSpecial::of_range(ty, &ty.min_value(), &ty.max_value())
            }
            ScalarType::Float(ty) => {
                CompareSpecial::of_float_range(ty, f64::NEG_INFINITY, f64::INFINITY)
            }
        }
    }
}

fn build_apply_table() -> MethodTable<ApplyHandler<Top>> {
    let mut table: MethodTable<ApplyHandler<Top>> = MethodTable::new();
    table.bind_all(&OperationKind::ALL, Handler::Bound(Top::apply_top));
    table
}

fn build_constraint_table() -> MethodTable<ConstraintHandler<Top>> {
    let mut table: MethodTable<ConstraintHandler<Top>> = MethodTable::new();
    table.bind_all(&OperationKind::ALL, Handler::Bound(Top::constrain_top));
    table
}

lazy_static! {
    pub static ref APPLY: MethodTable<ApplyHandler<Top>> = build_apply_table();
    pub static ref CONSTRAINT: MethodTable<ConstraintHandler<Top>> = build_constraint_table();
    pub static ref QUERY: QueryTable = query::top_table();
}
