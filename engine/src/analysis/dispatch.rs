//
// Operation dispatch tables
//
// Every element kind builds its tables once. A table has three sections (unary, compare,
// binary) indexed by the dense position of the operation within its section, so a lookup is
// an array access. An empty slot means the kind does not support the operation and the caller
// moves one rung up the re-dispatch ladder.
//

use num_bigint::BigInt;

use crate::analysis::context::{ConstraintContext, EvalContext};
use crate::analysis::element::ScalarElement;
use crate::analysis::query::{Query, QueryAnswer, QueryFamily, QUERY_FAMILY_COUNT, QUERY_SUB_COUNT};
use crate::error::{invariant_violation, EngineResult};
use crate::ir::operation::{
    Operation, OperationKind, Section, BINARY_COUNT, COMPARE_COUNT, UNARY_COUNT,
};
use crate::ir::typing::{IntType, ScalarType};

/// Forward handler shared by several element kinds
pub type GenericApplyFn = fn(&ScalarElement, &Operation, &mut EvalContext<'_>) -> bool;

/// Backward handler shared by several element kinds (receiver, operation, result, context)
pub type GenericConstraintFn =
    fn(&ScalarElement, &Operation, &ScalarElement, &mut ConstraintContext<'_>) -> bool;

/// Forward handler bound to one element kind
pub type ApplyFn<E> = fn(&E, &Operation, &mut EvalContext<'_>) -> bool;

/// Backward handler bound to one element kind
pub type ConstraintFn<E> =
    fn(&E, &Operation, &ScalarElement, &mut ConstraintContext<'_>) -> bool;

/// Query handler
pub type QueryFn = fn(&ScalarElement, &Query) -> EngineResult<QueryAnswer>;

/// Content of a table slot
#[derive(Copy, Clone)]
pub enum Handler<B, G> {
    /// implemented by the element kind itself
    Bound(B),
    /// implemented once for several kinds, on the closed element type
    Generic(G),
    /// a shortcut for constant operands, falling back to the general case when it declines
    Specialized { constant: B, general: B },
}

pub type ApplyHandler<E> = Handler<ApplyFn<E>, GenericApplyFn>;
pub type ConstraintHandler<E> = Handler<ConstraintFn<E>, GenericConstraintFn>;

/// A three-section table of handlers
pub struct MethodTable<H> {
    unary: [Option<H>; UNARY_COUNT],
    compare: [Option<H>; COMPARE_COUNT],
    binary: [Option<H>; BINARY_COUNT],
}

impl<H: Copy> MethodTable<H> {
    pub fn new() -> Self {
        Self {
            unary: [None; UNARY_COUNT],
            compare: [None; COMPARE_COUNT],
            binary: [None; BINARY_COUNT],
        }
    }

    fn slot(&mut self, kind: OperationKind) -> &mut Option<H> {
        match kind.section() {
            Section::Unary(index) => &mut self.unary[index],
            Section::Compare(index) => &mut self.compare[index],
            Section::Binary(index) => &mut self.binary[index],
        }
    }

    pub fn bind(&mut self, kind: OperationKind, handler: H) -> &mut Self {
        *self.slot(kind) = Some(handler);
        self
    }

    pub fn bind_all(&mut self, kinds: &[OperationKind], handler: H) -> &mut Self {
        for kind in kinds {
            self.bind(*kind, handler);
        }
        self
    }

    pub fn get(&self, kind: OperationKind) -> Option<H> {
        match kind.section() {
            Section::Unary(index) => self.unary[index],
            Section::Compare(index) => self.compare[index],
            Section::Binary(index) => self.binary[index],
        }
    }

    pub fn supports(&self, kind: OperationKind) -> bool {
        self.get(kind).is_some()
    }
}

impl<H: Copy> Default for MethodTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Result type of an operation a handler was dispatched to (checked at the entry point)
pub fn result_type_of(receiver: ScalarType, op: &Operation, ctx: &EvalContext<'_>) -> ScalarType {
    op.result_type(receiver, ctx.argument().map(|argument| argument.scalar_type()))
        .unwrap_or_else(|e| invariant_violation(e.to_string()))
}

/// Integer view of the second operand of a binary handler
pub fn argument_bounds(ctx: &EvalContext<'_>) -> (IntType, BigInt, BigInt) {
    ctx.argument()
        .and_then(|argument| argument.int_bounds())
        .unwrap_or_else(|| invariant_violation("integer operation without an integer operand"))
}

fn has_constant_operand(argument: Option<&ScalarElement>) -> bool {
    argument.map_or(false, |element| element.is_constant())
}

/// Run the forward handler of `op`; `inner` is the payload of `whole`
pub fn invoke_apply<E>(
    table: &MethodTable<ApplyHandler<E>>,
    inner: &E,
    whole: &ScalarElement,
    op: &Operation,
    ctx: &mut EvalContext<'_>,
) -> bool {
    match table.get(op.kind()) {
        None => false,
        Some(Handler::Bound(handler)) => handler(inner, op, ctx),
        Some(Handler::Generic(handler)) => handler(whole, op, ctx),
        Some(Handler::Specialized { constant, general }) => {
            (has_constant_operand(ctx.argument()) && constant(inner, op, ctx))
                || general(inner, op, ctx)
        }
    }
}

/// Run the backward handler of `op`; `inner` is the payload of `whole`
pub fn invoke_constraint<E>(
    table: &MethodTable<ConstraintHandler<E>>,
    inner: &E,
    whole: &ScalarElement,
    op: &Operation,
    result: &ScalarElement,
    ctx: &mut ConstraintContext<'_>,
) -> bool {
    match table.get(op.kind()) {
        None => false,
        Some(Handler::Bound(handler)) => handler(inner, op, result, ctx),
        Some(Handler::Generic(handler)) => handler(whole, op, result, ctx),
        Some(Handler::Specialized { constant, general }) => {
            (has_constant_operand(ctx.argument()) && constant(inner, op, result, ctx))
                || general(inner, op, result, ctx)
        }
    }
}

/// Two-level table of query handlers: family, then sub-operation
pub struct QueryTable {
    slots: [[Option<QueryFn>; QUERY_SUB_COUNT]; QUERY_FAMILY_COUNT],
}

impl QueryTable {
    pub fn new() -> Self {
        Self {
            slots: [[None; QUERY_SUB_COUNT]; QUERY_FAMILY_COUNT],
        }
    }

    pub fn bind(&mut self, family: QueryFamily, sub: usize, handler: QueryFn) -> &mut Self {
        self.slots[family as usize][sub] = Some(handler);
        self
    }

    /// Bind every sub-operation of a family to the same handler
    pub fn bind_family(&mut self, family: QueryFamily, handler: QueryFn) -> &mut Self {
        for sub in 0..family.sub_count() {
            self.bind(family, sub, handler);
        }
        self
    }

    pub fn get(&self, query: &Query) -> Option<QueryFn> {
        self.slots[query.family() as usize][query.sub_index()]
    }
}

impl Default for QueryTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accept(_: &u8, _: &Operation, _: &mut EvalContext<'_>) -> bool {
        true
    }

    fn decline(_: &u8, _: &Operation, _: &mut EvalContext<'_>) -> bool {
        false
    }

    fn generic(_: &ScalarElement, _: &Operation, ctx: &mut EvalContext<'_>) -> bool {
        ctx.merge_verdict_degradate();
        true
    }

    #[test]
    fn slots_follow_the_dense_index() {
        let mut table: MethodTable<ApplyHandler<u8>> = MethodTable::new();
        table
            .bind(OperationKind::Prev, Handler::Bound(accept))
            .bind(OperationKind::CompareLess, Handler::Generic(generic))
            .bind(OperationKind::BitSet, Handler::Bound(decline));
        assert!(table.supports(OperationKind::Prev));
        assert!(table.supports(OperationKind::CompareLess));
        assert!(table.supports(OperationKind::BitSet));
        assert!(!table.supports(OperationKind::Next));
        assert!(!table.supports(OperationKind::Plus));
        assert!(!table.supports(OperationKind::CompareGreater));
    }

    #[test]
    fn specialized_falls_back_to_general() {
        use crate::analysis::params::EXACT_STOP;

        let mut table: MethodTable<ApplyHandler<u8>> = MethodTable::new();
        table.bind(
            OperationKind::Plus,
            Handler::Specialized {
                constant: decline,
                general: accept,
            },
        );
        table.bind(OperationKind::Minus, Handler::Generic(generic));

        let whole = ScalarElement::bit(true);
        let argument = ScalarElement::bit(false);
        let mut ctx = EvalContext::new(&EXACT_STOP).with_argument(&argument);
        assert!(invoke_apply(&table, &0, &whole, &Operation::Plus, &mut ctx));
        assert!(!invoke_apply(&table, &0, &whole, &Operation::Times, &mut ctx));
        assert!(invoke_apply(&table, &0, &whole, &Operation::Minus, &mut ctx));
        assert!(!ctx.is_exact());
    }
}
