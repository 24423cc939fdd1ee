//
// Small sets of integer constants
//

use lazy_static::lazy_static;
use log::trace;
use num_bigint::BigInt;

use crate::analysis::context::{ConstraintContext, EvalContext};
use crate::analysis::dispatch::{ApplyHandler, ConstraintHandler, Handler, MethodTable, QueryTable};
use crate::analysis::element::ScalarElement;
use crate::analysis::generic::{AbstractDomain, Meet};
use crate::analysis::lattice::PrecisionKind;
use crate::analysis::query;
use crate::analysis::sign::CompareSpecial;
use crate::error::invariant_violation;
use crate::ir::operation::{Operation, OperationKind};
use crate::ir::typing::{IntType, ScalarType};

/// Run `op` on `receiver` against each of `arguments` and join the outcomes
pub(crate) fn apply_with_arguments(
    receiver: &ScalarElement,
    arguments: &[ScalarElement],
    op: &Operation,
    ctx: &mut EvalContext<'_>,
) -> bool {
    for argument in arguments {
        let handled = ctx.with_child(Some(argument), |child| receiver.apply(op, child));
        if !handled {
            ctx.seal_join();
            return false;
        }
    }
    ctx.seal_join();
    true
}

/// Run `op` on each of `receivers` against the operand of the context and join the outcomes
pub(crate) fn apply_members(
    receivers: &[ScalarElement],
    op: &Operation,
    ctx: &mut EvalContext<'_>,
) -> bool {
    let argument = ctx.argument();
    for receiver in receivers {
        let handled = ctx.with_child(argument, |child| receiver.apply(op, child));
        if !handled {
            ctx.seal_join();
            return false;
        }
    }
    ctx.seal_join();
    true
}

/// Split an enumerable, non-constant second operand into its members
pub(crate) fn spread_argument(
    receiver: &ScalarElement,
    op: &Operation,
    ctx: &mut EvalContext<'_>,
) -> bool {
    let members = match ctx.argument() {
        Some(argument) if !argument.is_constant() => match argument.members() {
            None => return false,
            Some(members) => members,
        },
        _ => return false,
    };
    trace!("{} spread over {} operands", op, members.len());
    apply_with_arguments(receiver, &members, op, ctx)
}

fn join_into(slot: &mut Option<ScalarElement>, element: ScalarElement) -> bool {
    match slot.take() {
        None => {
            *slot = Some(element);
            true
        }
        Some(previous) => {
            let joined = previous.join(&element);
            let exact = previous.is_exact_join(&element, &joined);
            *slot = Some(joined);
            exact
        }
    }
}

/// Refine by constraining every receiver member separately
///
/// Members that cannot produce the result disappear; the survivors and the source values
/// compatible with them are joined back.
pub(crate) fn partition(
    members: &[ScalarElement],
    op: &Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    let selector = ctx.selector();
    let source = ctx.argument();
    let mut kept = None;
    let mut sources = None;
    let mut exact = true;

    for member in members {
        let mut child = ctx.fork(source, selector);
        if !member.constrain_as(op, result, &mut child) {
            ctx.seal_branches();
            return false;
        }
        ctx.absorb_branch(&child);
        if child.is_empty() {
            continue;
        }
        exact &= join_into(&mut kept, child.refined_or(selector, member));
        if let Some(source) = source {
            exact &= join_into(&mut sources, child.refined_or(selector.inverse(), source));
        }
    }

    ctx.seal_branches();
    match kept {
        None => ctx.set_empty(),
        Some(kept) => {
            ctx.refine_receiver(kept);
            if let Some(sources) = sources {
                ctx.refine_source(sources);
            }
        }
    }
    ctx.merge_verdict(exact);
    true
}

/// Between two and the configured limit of distinct integer constants, sorted
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Disjunction {
    ty: IntType,
    values: Vec<BigInt>,
}

impl Disjunction {
    /// Wrap values that are known to be sorted, distinct and in range
    pub(crate) fn new(ty: IntType, values: Vec<BigInt>) -> Self {
        if values.len() < 2 || values.windows(2).any(|pair| pair[0] >= pair[1]) {
            invariant_violation(format!("malformed disjunction of {} values", values.len()));
        }
        Self { ty, values }
    }

    pub fn ty(&self) -> &IntType {
        &self.ty
    }

    pub fn values(&self) -> &[BigInt] {
        &self.values
    }

    pub fn min(&self) -> &BigInt {
        &self.values[0]
    }

    pub fn max(&self) -> &BigInt {
        &self.values[self.values.len() - 1]
    }

    pub fn contains(&self, value: &BigInt) -> bool {
        self.values.binary_search(value).is_ok()
    }

    /// Whether the values leave no gap
    pub fn is_contiguous(&self) -> bool {
        self.max() - self.min() + 1 == BigInt::from(self.values.len())
    }

    fn own_type(&self) -> ScalarType {
        ScalarType::Int(self.ty)
    }

    fn member_elements(&self) -> Vec<ScalarElement> {
        self.values
            .iter()
            .map(|value| ScalarElement::int_constant_of(self.own_type(), value.clone()))
            .collect()
    }

    fn apply_each(&self, op: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        apply_members(&self.member_elements(), op, ctx)
    }

    fn constrain_each(
        &self,
        op: &Operation,
        result: &ScalarElement,
        ctx: &mut ConstraintContext<'_>,
    ) -> bool {
        partition(&self.member_elements(), op, result, ctx)
    }

    fn filtered<F: Fn(&BigInt) -> bool>(&self, keep: F) -> Meet {
        let kept: Vec<BigInt> = self.values.iter().filter(|v| keep(v)).cloned().collect();
        if kept.is_empty() {
            Meet::Bottom
        } else {
            Meet::Element(ScalarElement::from_int_values(self.own_type(), kept))
        }
    }
}

impl AbstractDomain for Disjunction {
    const PRECISION: PrecisionKind = PrecisionKind::Disjunction;

    fn scalar_type(&self) -> ScalarType {
        self.own_type()
    }

    fn merge(&self, other: &ScalarElement) -> Option<ScalarElement> {
        let ty = self.own_type();
        match other {
            ScalarElement::Int(_) | ScalarElement::Disjunction(_) => {
                let mut values = self.values.clone();
                values.extend(other.int_values()?);
                Some(ScalarElement::from_int_values(ty, values))
            }
            ScalarElement::IntInterval(o) => Some(ScalarElement::from_int_range(
                ty,
                o.lo().min(self.min()).clone(),
                o.hi().max(self.max()).clone(),
            )),
            _ => None,
        }
    }

    fn intersect(&self, other: &ScalarElement) -> Option<Meet> {
        match other {
            ScalarElement::Int(_) | ScalarElement::IntInterval(_) | ScalarElement::Disjunction(_) => {
                Some(self.filtered(|value| other.contains_int(value)))
            }
            _ => None,
        }
    }

    fn contain(&self, other: &ScalarElement) -> Option<bool> {
        match other {
            ScalarElement::Int(_) | ScalarElement::Disjunction(_) => {
                Some(other.int_values()?.iter().all(|value| self.contains(value)))
            }
            ScalarElement::IntInterval(o) => {
                let covered = self.values.iter().filter(|v| other.contains_int(v)).count();
                Some(BigInt::from(covered) == o.hi() - o.lo() + 1)
            }
            _ => None,
        }
    }

    fn contain_to(&self, source: &ScalarElement) -> Option<bool> {
        match source {
            ScalarElement::Int(_) => Some(false),
            ScalarElement::IntInterval(_) => {
                Some(self.values.iter().all(|value| source.contains_int(value)))
            }
            _ => None,
        }
    }

    fn compare_special(&self) -> CompareSpecial {
        self.values
            .iter()
            .map(|value| CompareSpecial::of_value(&self.ty, value))
            .fold(CompareSpecial::bottom(), |acc, special| acc.join(&special))
    }
}

fn build_apply_table() -> MethodTable<ApplyHandler<Disjunction>> {
    let mut table: MethodTable<ApplyHandler<Disjunction>> = MethodTable::new();
    table.bind_all(&OperationKind::ALL, Handler::Bound(Disjunction::apply_each));
    table
}

fn build_constraint_table() -> MethodTable<ConstraintHandler<Disjunction>> {
    let mut table: MethodTable<ConstraintHandler<Disjunction>> = MethodTable::new();
    table.bind_all(&OperationKind::ALL, Handler::Bound(Disjunction::constrain_each));
    table
}

lazy_static! {
    pub static ref APPLY: MethodTable<ApplyHandler<Disjunction>> = build_apply_table();
    pub static ref CONSTRAINT: MethodTable<ConstraintHandler<Disjunction>> =
        build_constraint_table();
    pub static ref QUERY: QueryTable = query::integer_table();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::context::ErrorKind;
    use crate::analysis::params::{EXACT_PROPAGATE, EXACT_STOP};

    fn i8t() -> IntType {
        IntType::signed(8).unwrap()
    }

    fn set(values: &[i64]) -> ScalarElement {
        ScalarElement::disjunction(i8t(), values.iter().map(|v| BigInt::from(*v))).unwrap()
    }

    fn int(v: i64) -> ScalarElement {
        ScalarElement::int(i8t(), v).unwrap()
    }

    #[test]
    fn forward_goes_member_by_member() {
        let x = set(&[1, 4]);
        let y = set(&[10, 20]);
        let mut ctx = EvalContext::new(&EXACT_STOP).with_argument(&y);
        assert!(x.apply(&Operation::Plus, &mut ctx));
        assert_eq!(ctx.result(), Some(&set(&[11, 14, 21, 24])));
        assert!(ctx.is_exact());

        let zero = set(&[0, 2]);
        let mut ctx = EvalContext::new(&EXACT_STOP).with_argument(&zero);
        assert!(int(8).apply(&Operation::Divide, &mut ctx));
        assert_eq!(ctx.result(), Some(&int(4)));
        assert!(ctx.errors().is_possible(ErrorKind::DivisionByZero));
        assert!(!ctx.errors().is_certain(ErrorKind::DivisionByZero));
    }

    #[test]
    fn forward_past_the_limit_widens() {
        let x = set(&[0, 1, 2, 3]);
        let y = set(&[0, 16, 32, 48]);
        let mut ctx = EvalContext::new(&EXACT_PROPAGATE).with_argument(&y);
        assert!(x.apply(&Operation::Plus, &mut ctx));
        assert_eq!(ctx.result(), Some(&ScalarElement::int_range(i8t(), 0, 51).unwrap()));
        assert!(!ctx.is_exact());
    }

    #[test]
    fn lattice_operations() {
        let x = set(&[1, 3, 5]);
        assert_eq!(x.join(&int(7)), set(&[1, 3, 5, 7]));
        let interval = ScalarElement::int_range(i8t(), 2, 6).unwrap();
        assert_eq!(x.meet(&interval), Meet::Element(set(&[3, 5])));
        assert_eq!(x.meet(&int(2)), Meet::Bottom);
        assert!(x.contains(&set(&[1, 5])));
        assert!(!x.contains(&interval));
        assert!(set(&[2, 3, 4]).contains(&ScalarElement::int_range(i8t(), 2, 4).unwrap()));
        assert!(interval.contains(&set(&[3, 5])));
    }

    #[test]
    fn backward_drops_impossible_members() {
        let x = set(&[1, 4, 9]);
        let y = int(3);
        let result = ScalarElement::int_range(i8t(), 5, 10).unwrap();
        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&y);
        assert!(x.constraint(&Operation::Plus, &result, &mut ctx));
        assert_eq!(ctx.first(), Some(&int(4)));
        assert!(!ctx.is_empty());

        let result = int(100);
        let mut ctx = ConstraintContext::new(&EXACT_STOP).with_argument(&y);
        assert!(x.constraint(&Operation::Plus, &result, &mut ctx));
        assert!(ctx.is_empty());
    }
}
