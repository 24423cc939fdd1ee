//
// Read-only questions asked of an element, dispatched by family and sub-operation
//

use num_bigint::BigInt;

use crate::analysis::dispatch::QueryTable;
use crate::analysis::element::{ScalarElement, ScalarValue};
use crate::analysis::generic::OperationFamily;
use crate::analysis::range::IntInterval;
use crate::analysis::sign::CompareSpecial;
use crate::error::{EngineError, EngineResult, Unsupported};
use crate::ir::typing::ScalarType;

/// Families of queries
#[derive(Eq, PartialEq, Copy, Clone, Hash, Debug)]
#[repr(usize)]
pub enum QueryFamily {
    /// compare-special classification and simplification
    Special,
    /// build an element of the receiver's type
    Construct,
    /// copies
    Duplicate,
    /// native operation family
    Family,
    /// extract concrete information
    Extern,
}

pub const QUERY_FAMILY_COUNT: usize = 5;
/// Largest number of sub-operations in a family
pub const QUERY_SUB_COUNT: usize = 4;

impl QueryFamily {
    pub fn sub_count(self) -> usize {
        match self {
            Self::Special => 2,
            Self::Construct => 4,
            Self::Duplicate => 2,
            Self::Family => 1,
            Self::Extern => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Special => "special",
            Self::Construct => "construct",
            Self::Duplicate => "duplicate",
            Self::Family => "family",
            Self::Extern => "extern",
        }
    }
}

/// A query with its parameters
#[derive(Clone, Debug, PartialEq)]
pub enum Query {
    CompareSpecial,
    Simplification,
    ConstructConstant(ScalarValue),
    ConstructInterval { lo: ScalarValue, hi: ScalarValue },
    ConstructDisjunction(Vec<ScalarValue>),
    ConstructTop,
    Clone,
    /// the finest kind describing the same values
    Specialize,
    NativeFamily,
    Bounds,
    ConstantValue,
    Truthiness,
}

impl Query {
    pub fn family(&self) -> QueryFamily {
        match self {
            Self::CompareSpecial | Self::Simplification => QueryFamily::Special,
            Self::ConstructConstant(_)
            | Self::ConstructInterval { .. }
            | Self::ConstructDisjunction(_)
            | Self::ConstructTop => QueryFamily::Construct,
            Self::Clone | Self::Specialize => QueryFamily::Duplicate,
            Self::NativeFamily => QueryFamily::Family,
            Self::Bounds | Self::ConstantValue | Self::Truthiness => QueryFamily::Extern,
        }
    }

    /// Position within the family
    pub fn sub_index(&self) -> usize {
        match self {
            Self::CompareSpecial => 0,
            Self::Simplification => 1,
            Self::ConstructConstant(_) => 0,
            Self::ConstructInterval { .. } => 1,
            Self::ConstructDisjunction(_) => 2,
            Self::ConstructTop => 3,
            Self::Clone => 0,
            Self::Specialize => 1,
            Self::NativeFamily => 0,
            Self::Bounds => 0,
            Self::ConstantValue => 1,
            Self::Truthiness => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CompareSpecial => "compare-special",
            Self::Simplification => "simplification",
            Self::ConstructConstant(_) => "constant",
            Self::ConstructInterval { .. } => "interval",
            Self::ConstructDisjunction(_) => "disjunction",
            Self::ConstructTop => "top",
            Self::Clone => "clone",
            Self::Specialize => "specialize",
            Self::NativeFamily => "native",
            Self::Bounds => "bounds",
            Self::ConstantValue => "constant-value",
            Self::Truthiness => "truthiness",
        }
    }
}

/// Whether a value is known to be nonzero
#[derive(Eq, PartialEq, Copy, Clone, Hash, Debug)]
pub enum Truthiness {
    True,
    False,
    Undecided,
}

#[derive(Clone, Debug, PartialEq)]
pub enum QueryAnswer {
    CompareSpecial(CompareSpecial),
    Element(ScalarElement),
    Family(OperationFamily),
    IntBounds { lo: BigInt, hi: BigInt },
    /// `range` is `None` for NaN alone
    FloatBounds { range: Option<(f64, f64)>, nan: bool },
    Value(ScalarValue),
    Truthiness(Truthiness),
}

pub(crate) fn unsupported(element: &ScalarElement, query: &Query) -> EngineError {
    EngineError::NotSupportedYet(Unsupported::Query {
        family: query.family().name(),
        request: query.name(),
        kind: element.kind_name(),
    })
}

fn mismatch(element: &ScalarElement, query: &Query) -> EngineError {
    EngineError::InvalidOperation(format!(
        "{:?} does not build a value of {}",
        query,
        element.scalar_type()
    ))
}

/// The same values in the finest available shape
pub(crate) fn simplify(element: &ScalarElement) -> ScalarElement {
    match element {
        ScalarElement::Disjunction(e) if e.is_contiguous() => {
            ScalarElement::from_int_range(element.scalar_type(), e.min().clone(), e.max().clone())
        }
        ScalarElement::IntInterval(e) => {
            ScalarElement::from_int_range(element.scalar_type(), e.lo().clone(), e.hi().clone())
        }
        _ => element.clone(),
    }
}

fn query_compare_special(element: &ScalarElement, _: &Query) -> EngineResult<QueryAnswer> {
    Ok(QueryAnswer::CompareSpecial(element.compare_special()))
}

fn query_simplification(element: &ScalarElement, _: &Query) -> EngineResult<QueryAnswer> {
    Ok(QueryAnswer::Element(simplify(element)))
}

fn construct_constant(element: &ScalarElement, query: &Query) -> EngineResult<QueryAnswer> {
    match query {
        Query::ConstructConstant(value) => {
            ScalarElement::constant(element.scalar_type(), value.clone()).map(QueryAnswer::Element)
        }
        _ => Err(mismatch(element, query)),
    }
}

fn construct_interval(element: &ScalarElement, query: &Query) -> EngineResult<QueryAnswer> {
    let built = match (element.scalar_type(), query) {
        (
            ScalarType::Bit,
            Query::ConstructInterval {
                lo: ScalarValue::Bit(lo),
                hi: ScalarValue::Bit(hi),
            },
        ) if lo <= hi => ScalarElement::from_int_range(
            ScalarType::Bit,
            BigInt::from(*lo as u8),
            BigInt::from(*hi as u8),
        ),
        (
            ScalarType::Int(ty),
            Query::ConstructInterval {
                lo: ScalarValue::Int(lo),
                hi: ScalarValue::Int(hi),
            },
        ) => ScalarElement::int_range(ty, lo.clone(), hi.clone())?,
        (
            ScalarType::Float(ty),
            Query::ConstructInterval {
                lo: ScalarValue::Float(lo),
                hi: ScalarValue::Float(hi),
            },
        ) => ScalarElement::float_range(ty, *lo, *hi)?,
        _ => return Err(mismatch(element, query)),
    };
    Ok(QueryAnswer::Element(built))
}

fn construct_disjunction(element: &ScalarElement, query: &Query) -> EngineResult<QueryAnswer> {
    let values = match query {
        Query::ConstructDisjunction(values) => values,
        _ => return Err(mismatch(element, query)),
    };
    let ty = element.scalar_type();
    let mut ints = vec![];
    for value in values {
        match (ty, value) {
            (ScalarType::Bit, ScalarValue::Bit(v)) => ints.push(BigInt::from(*v as u8)),
            (ScalarType::Int(_), ScalarValue::Int(v)) => ints.push(v.clone()),
            (ScalarType::Float(_), _) => return Err(unsupported(element, query)),
            _ => return Err(mismatch(element, query)),
        }
    }
    let built = match ty {
        ScalarType::Int(int) => ScalarElement::disjunction(int, ints)?,
        _ if ints.is_empty() => return Err(mismatch(element, query)),
        _ => ScalarElement::from_int_values(ty, ints),
    };
    Ok(QueryAnswer::Element(built))
}

fn construct_top(element: &ScalarElement, _: &Query) -> EngineResult<QueryAnswer> {
    Ok(QueryAnswer::Element(ScalarElement::top(element.scalar_type())))
}

fn duplicate_clone(element: &ScalarElement, _: &Query) -> EngineResult<QueryAnswer> {
    Ok(QueryAnswer::Element(element.clone()))
}

/// Like simplification, also trading an integer top for the interval it stands for
fn duplicate_specialize(element: &ScalarElement, _: &Query) -> EngineResult<QueryAnswer> {
    let specialized = match element.scalar_type() {
        ScalarType::Int(ty) if element.is_top() => ScalarElement::IntInterval(IntInterval::full(ty)),
        _ => simplify(element),
    };
    Ok(QueryAnswer::Element(specialized))
}

fn native_family(element: &ScalarElement, _: &Query) -> EngineResult<QueryAnswer> {
    Ok(QueryAnswer::Family(OperationFamily::of(&element.scalar_type())))
}

fn int_bounds(element: &ScalarElement, query: &Query) -> EngineResult<QueryAnswer> {
    match element.int_bounds() {
        Some((_, lo, hi)) => Ok(QueryAnswer::IntBounds { lo, hi }),
        None => Err(unsupported(element, query)),
    }
}

fn float_bounds(element: &ScalarElement, query: &Query) -> EngineResult<QueryAnswer> {
    match element.float_set() {
        Some(set) => Ok(QueryAnswer::FloatBounds {
            range: set.bounds(),
            nan: set.may_be_nan(),
        }),
        None => Err(unsupported(element, query)),
    }
}

fn any_bounds(element: &ScalarElement, query: &Query) -> EngineResult<QueryAnswer> {
    match element.scalar_type() {
        ScalarType::Float(_) => float_bounds(element, query),
        ScalarType::Bit | ScalarType::Int(_) => int_bounds(element, query),
    }
}

fn constant_value(element: &ScalarElement, _: &Query) -> EngineResult<QueryAnswer> {
    element
        .constant_value()
        .map(QueryAnswer::Value)
        .ok_or(EngineError::NotSupportedYet(Unsupported::NonConstantValue))
}

fn truthiness(element: &ScalarElement, _: &Query) -> EngineResult<QueryAnswer> {
    Ok(QueryAnswer::Truthiness(element.truthiness()))
}

/// Handlers every element kind answers
fn base_table() -> QueryTable {
    let mut table = QueryTable::new();
    table
        .bind(QueryFamily::Special, 0, query_compare_special)
        .bind(QueryFamily::Special, 1, query_simplification)
        .bind(QueryFamily::Construct, 0, construct_constant)
        .bind(QueryFamily::Construct, 1, construct_interval)
        .bind(QueryFamily::Construct, 3, construct_top)
        .bind(QueryFamily::Duplicate, 0, duplicate_clone)
        .bind(QueryFamily::Duplicate, 1, duplicate_specialize)
        .bind_family(QueryFamily::Family, native_family)
        .bind(QueryFamily::Extern, 1, constant_value)
        .bind(QueryFamily::Extern, 2, truthiness);
    table
}

/// Bits and integers
pub fn integer_table() -> QueryTable {
    let mut table = base_table();
    table
        .bind(QueryFamily::Construct, 2, construct_disjunction)
        .bind(QueryFamily::Extern, 0, int_bounds);
    table
}

/// Floats have no disjunctions
pub fn float_table() -> QueryTable {
    let mut table = base_table();
    table.bind(QueryFamily::Extern, 0, float_bounds);
    table
}

/// Top stands for every type
pub fn top_table() -> QueryTable {
    let mut table = base_table();
    table
        .bind(QueryFamily::Construct, 2, construct_disjunction)
        .bind(QueryFamily::Extern, 0, any_bounds);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::typing::{FloatType, IntType};

    fn i8t() -> IntType {
        IntType::signed(8).unwrap()
    }

    #[test]
    fn families_fit_the_table() {
        for family in [
            QueryFamily::Special,
            QueryFamily::Construct,
            QueryFamily::Duplicate,
            QueryFamily::Family,
            QueryFamily::Extern,
        ] {
            assert!(family.sub_count() <= QUERY_SUB_COUNT);
            assert!((family as usize) < QUERY_FAMILY_COUNT);
        }
        assert_eq!(Query::ConstructTop.family(), QueryFamily::Construct);
        assert_eq!(Query::Truthiness.sub_index(), 2);
    }

    #[test]
    fn construction_follows_the_receiver_type() {
        let x = ScalarElement::int(i8t(), 3).unwrap();
        let answer = x.query(&Query::ConstructInterval {
            lo: ScalarValue::Int(BigInt::from(-4)),
            hi: ScalarValue::Int(BigInt::from(4)),
        });
        assert_eq!(
            answer,
            Ok(QueryAnswer::Element(ScalarElement::int_range(i8t(), -4, 4).unwrap()))
        );
        assert!(matches!(
            x.query(&Query::ConstructConstant(ScalarValue::Float(1.0))),
            Err(EngineError::InvalidOperation(_))
        ));
    }

    #[test]
    fn floats_have_no_disjunction() {
        let x = ScalarElement::float(FloatType::DOUBLE, 1.5);
        let answer = x.query(&Query::ConstructDisjunction(vec![ScalarValue::Float(1.0)]));
        assert!(matches!(
            answer,
            Err(EngineError::NotSupportedYet(Unsupported::Query {
                request: "disjunction",
                ..
            }))
        ));
    }

    #[test]
    fn extraction() {
        let x = ScalarElement::int_range(i8t(), 1, 9).unwrap();
        assert_eq!(
            x.query(&Query::Bounds),
            Ok(QueryAnswer::IntBounds {
                lo: BigInt::from(1),
                hi: BigInt::from(9)
            })
        );
        assert_eq!(x.query(&Query::Truthiness), Ok(QueryAnswer::Truthiness(Truthiness::True)));
        assert_eq!(
            x.query(&Query::ConstantValue),
            Err(EngineError::NotSupportedYet(Unsupported::NonConstantValue))
        );
        assert_eq!(
            x.query(&Query::NativeFamily),
            Ok(QueryAnswer::Family(OperationFamily::Signed))
        );
    }

    #[test]
    fn specialization() {
        let top = ScalarElement::top(ScalarType::Int(i8t()));
        assert_eq!(
            top.query(&Query::Specialize),
            Ok(QueryAnswer::Element(ScalarElement::int_range(i8t(), -128, 127).unwrap()))
        );
        let set = ScalarElement::disjunction(i8t(), (2..5).map(BigInt::from)).unwrap();
        assert_eq!(
            set.query(&Query::Simplification),
            Ok(QueryAnswer::Element(ScalarElement::int_range(i8t(), 2, 4).unwrap()))
        );
    }
}
