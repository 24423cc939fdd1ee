use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::analysis::element::ScalarElement;
use crate::error::{EngineError, EngineResult};

//
// Evaluation metadata
//

/// Outcome of an operation, ordered so that merging two verdicts is taking the max
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Hash, Debug, Serialize, Deserialize)]
pub enum Verdict {
    NotPerformed,
    Exact,
    Degraded,
}

/// What the caller knows about the operands it hands over
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Hash, Debug, Serialize, Deserialize)]
pub enum Information {
    /// operands describe exactly the reachable values
    Exact,
    /// operands over-approximate the reachable values
    Sure,
    /// operands may describe only part of the reachable values
    May,
}

/// How far an operation may go when the exact result is not representable
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Hash, Debug, Serialize, Deserialize)]
pub enum LatticeCreation {
    Formal,
    Disjunction,
    Interval,
    ShareTop,
    Top,
}

#[derive(Deserialize)]
struct LatticePolicyRepr {
    sure: LatticeCreation,
    may: LatticeCreation,
}

/// A pair of creation bounds with `sure <= may`
#[derive(Eq, PartialEq, Copy, Clone, Hash, Debug, Serialize, Deserialize)]
#[serde(try_from = "LatticePolicyRepr")]
pub struct LatticePolicy {
    sure: LatticeCreation,
    may: LatticeCreation,
}

impl TryFrom<LatticePolicyRepr> for LatticePolicy {
    type Error = EngineError;

    fn try_from(repr: LatticePolicyRepr) -> EngineResult<Self> {
        Self::new(repr.sure, repr.may)
    }
}

impl LatticePolicy {
    pub fn new(sure: LatticeCreation, may: LatticeCreation) -> EngineResult<Self> {
        if sure > may {
            return Err(EngineError::InvalidOperation(format!(
                "lattice policy with sure bound {:?} above may bound {:?}",
                sure, may
            )));
        }
        Ok(Self { sure, may })
    }

    pub fn sure(&self) -> LatticeCreation {
        self.sure
    }

    pub fn may(&self) -> LatticeCreation {
        self.may
    }

    /// Lower both bounds to at most `bound`
    pub fn intersect(&mut self, bound: LatticeCreation) {
        self.sure = self.sure.min(bound);
        self.may = self.may.min(bound);
    }

    /// Raise the may bound to at least `bound`
    pub fn authorize(&mut self, bound: LatticeCreation) {
        self.may = self.may.max(bound);
    }
}

/// Kinds of errors an arithmetic operation can run into
#[derive(Eq, PartialEq, Copy, Clone, Hash, Debug, Serialize, Deserialize)]
pub enum ErrorKind {
    PositiveOverflow,
    NegativeOverflow,
    Underflow,
    DivisionByZero,
    NaN,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 5] = [
        Self::PositiveOverflow,
        Self::NegativeOverflow,
        Self::Underflow,
        Self::DivisionByZero,
        Self::NaN,
    ];

    fn mask(self) -> u8 {
        1 << (self as u8)
    }
}

/// Possible and certain error states
#[derive(Eq, PartialEq, Copy, Clone, Hash, Debug, Default)]
pub struct ErrorFlags {
    possible: u8,
    certain: u8,
}

impl ErrorFlags {
    pub fn mark(&mut self, kind: ErrorKind, certain: bool) {
        self.possible |= kind.mask();
        if certain {
            self.certain |= kind.mask();
        }
    }

    pub fn is_possible(&self, kind: ErrorKind) -> bool {
        self.possible & kind.mask() != 0
    }

    pub fn is_certain(&self, kind: ErrorKind) -> bool {
        self.certain & kind.mask() != 0
    }

    pub fn any_possible(&self) -> bool {
        self.possible != 0
    }

    pub fn merge(&mut self, other: &Self) {
        self.possible |= other.possible;
        self.certain |= other.certain;
    }

    /// Combine with the flags of an alternative branch: certain only if certain in both
    pub fn merge_branch(&mut self, other: &Self) {
        self.possible |= other.possible;
        self.certain &= other.certain;
    }
}

/// What to do with executions that run into an error
#[derive(Eq, PartialEq, Copy, Clone, Hash, Debug, Serialize, Deserialize)]
pub enum ErrorPolicy {
    /// prune them: their results are unreachable
    Stop,
    /// keep them with the machine result, degrading precision
    Propagate,
}

/// Immutable parameters of an evaluation, see `analysis::params` for the presets
#[derive(Eq, PartialEq, Copy, Clone, Hash, Debug, Serialize, Deserialize)]
pub struct EvalParams {
    pub information: Information,
    pub errors: ErrorPolicy,
    pub policy: LatticePolicy,
    pub max_depth: u32,
}

//
// Evaluation context
//

/// Per-call state threaded through forward transfer and lattice operations
///
/// The receiver of an operation is passed explicitly; the context holds the second operand by
/// reference and owns the produced result.
#[derive(Debug)]
pub struct EvalContext<'a> {
    params: EvalParams,
    argument: Option<&'a ScalarElement>,
    result: Option<ScalarElement>,
    verdict: Verdict,
    errors: ErrorFlags,
    unstable: bool,
    empty: bool,
    incomplete: bool,
    /// flags of the nested evaluations joined so far
    branches: Option<ErrorFlags>,
    depth: u32,
}

impl<'a> EvalContext<'a> {
    pub fn new(params: &EvalParams) -> Self {
        Self {
            params: *params,
            argument: None,
            result: None,
            verdict: Verdict::NotPerformed,
            errors: ErrorFlags::default(),
            unstable: false,
            empty: false,
            incomplete: false,
            branches: None,
            depth: 0,
        }
    }

    pub fn with_argument(mut self, argument: &'a ScalarElement) -> Self {
        self.argument = Some(argument);
        self
    }

    pub fn params(&self) -> &EvalParams {
        &self.params
    }

    pub fn information(&self) -> Information {
        self.params.information
    }

    pub fn policy(&self) -> &LatticePolicy {
        &self.params.policy
    }

    pub fn intersect_policy(&mut self, bound: LatticeCreation) {
        self.params.policy.intersect(bound);
    }

    pub fn authorize_policy(&mut self, bound: LatticeCreation) {
        self.params.policy.authorize(bound);
    }

    /// The most approximate shape results may take in this evaluation
    pub fn creation_bound(&self) -> LatticeCreation {
        match self.params.information {
            Information::May => self.params.policy.may,
            Information::Exact | Information::Sure => self.params.policy.sure,
        }
    }

    pub fn argument(&self) -> Option<&'a ScalarElement> {
        self.argument
    }

    pub fn set_result(&mut self, result: ScalarElement) {
        self.result = Some(result);
    }

    pub fn result(&self) -> Option<&ScalarElement> {
        self.result.as_ref()
    }

    pub fn take_result(&mut self) -> Option<ScalarElement> {
        self.result.take()
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn is_exact(&self) -> bool {
        self.verdict == Verdict::Exact
    }

    pub fn merge_verdict_exact(&mut self) {
        self.verdict = self.verdict.max(Verdict::Exact);
    }

    pub fn merge_verdict_degradate(&mut self) {
        self.verdict = Verdict::Degraded;
    }

    /// Merge exact or degraded depending on the flag
    pub fn merge_verdict(&mut self, exact: bool) {
        if exact {
            self.merge_verdict_exact()
        } else {
            self.merge_verdict_degradate()
        }
    }

    pub fn errors(&self) -> &ErrorFlags {
        &self.errors
    }

    pub fn stops_on_error(&self) -> bool {
        self.params.errors == ErrorPolicy::Stop
    }

    /// Mark an error as possible
    pub fn set_error(&mut self, kind: ErrorKind) {
        self.errors.mark(kind, false);
    }

    /// Mark an error as possible, and certain unless the information is only a may-approximation
    pub fn set_error_with(&mut self, kind: ErrorKind, information: Information) {
        self.errors.mark(kind, information != Information::May);
    }

    /// Mark an error, as certain when every value of the operands triggers it
    pub fn flag_error(&mut self, kind: ErrorKind, certain: bool) {
        if certain {
            self.set_error_with(kind, self.params.information)
        } else {
            self.set_error(kind)
        }
    }

    pub fn set_positive_overflow(&mut self) {
        self.set_error(ErrorKind::PositiveOverflow)
    }

    pub fn set_positive_overflow_with(&mut self, information: Information) {
        self.set_error_with(ErrorKind::PositiveOverflow, information)
    }

    pub fn set_negative_overflow(&mut self) {
        self.set_error(ErrorKind::NegativeOverflow)
    }

    pub fn set_negative_overflow_with(&mut self, information: Information) {
        self.set_error_with(ErrorKind::NegativeOverflow, information)
    }

    pub fn set_underflow(&mut self) {
        self.set_error(ErrorKind::Underflow)
    }

    pub fn set_underflow_with(&mut self, information: Information) {
        self.set_error_with(ErrorKind::Underflow, information)
    }

    pub fn set_division_by_zero(&mut self) {
        self.set_error(ErrorKind::DivisionByZero)
    }

    pub fn set_division_by_zero_with(&mut self, information: Information) {
        self.set_error_with(ErrorKind::DivisionByZero, information)
    }

    pub fn set_nan(&mut self) {
        self.set_error(ErrorKind::NaN)
    }

    pub fn set_nan_with(&mut self, information: Information) {
        self.set_error_with(ErrorKind::NaN, information)
    }

    pub fn is_unstable(&self) -> bool {
        self.unstable
    }

    pub fn set_unstable(&mut self) {
        self.unstable = true;
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    /// The operation proved that no value flows out; only `clear` undoes this
    pub fn set_empty(&mut self) {
        self.empty = true;
        self.result = None;
    }

    /// Reset every outcome of a previous evaluation, keeping parameters and operands
    pub fn clear(&mut self) {
        self.result = None;
        self.verdict = Verdict::NotPerformed;
        self.errors = ErrorFlags::default();
        self.unstable = false;
        self.empty = false;
        self.incomplete = false;
        self.branches = None;
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn is_depth_exceeded(&self) -> bool {
        self.depth >= self.params.max_depth
    }

    /// Open a nested evaluation one level deeper, with its own second operand
    pub fn spawn<'b>(&self, argument: Option<&'b ScalarElement>) -> Transmit<'b> {
        let mut inner = EvalContext::new(&self.params);
        inner.argument = argument;
        inner.depth = self.depth + 1;
        Transmit { inner }
    }

    /// Run `f` in a nested evaluation that is merged back on return
    pub fn with_child<'b, R, F>(&mut self, argument: Option<&'b ScalarElement>, f: F) -> R
    where
        F: FnOnce(&mut EvalContext<'b>) -> R,
    {
        let mut child = self.spawn(argument);
        let ret = f(&mut *child);
        child.finish(self);
        ret
    }

    /// Conclude a series of nested evaluations joined into this context
    ///
    /// No contribution at all means every branch was pruned; a branch that could not be
    /// performed makes the whole join not performed.
    pub fn seal_join(&mut self) {
        self.seal_branches();
        if self.incomplete {
            self.result = None;
            self.verdict = Verdict::NotPerformed;
            self.incomplete = false;
        } else if self.result.is_none() && !self.empty {
            self.set_empty();
            self.merge_verdict_exact();
        }
    }

    /// Record the errors of the joined nested evaluations: possible in one, certain in all
    pub fn seal_branches(&mut self) {
        if let Some(branches) = self.branches.take() {
            self.errors.merge(&branches);
        }
    }

    fn absorb_branch(&mut self, child: &EvalContext<'_>) {
        self.unstable |= child.unstable;
        self.verdict = self.verdict.max(child.verdict);
        match self.branches.as_mut() {
            None => self.branches = Some(child.errors),
            Some(branches) => branches.merge_branch(&child.errors),
        }
    }

    fn absorb_flags(&mut self, child: &EvalContext<'_>) {
        self.errors.merge(&child.errors);
        self.unstable |= child.unstable;
        self.verdict = self.verdict.max(child.verdict);
    }
}

/// A nested evaluation that must be merged into its parent exactly once
#[must_use = "a transmit context must be finished or released"]
#[derive(Debug)]
pub struct Transmit<'b> {
    inner: EvalContext<'b>,
}

impl<'b> Transmit<'b> {
    /// Merge verdict, errors and result (by join) into the parent
    pub fn finish(self, parent: &mut EvalContext<'_>) {
        let mut child = self.inner;
        parent.absorb_branch(&child);
        if child.empty {
            // a pruned branch contributes nothing to the join
            return;
        }
        match child.result.take() {
            None => parent.incomplete = true,
            Some(result) => {
                let joined = match parent.result.take() {
                    None => result,
                    Some(previous) => {
                        let joined = previous.join(&result);
                        if !previous.is_exact_join(&result, &joined) {
                            parent.merge_verdict_degradate();
                        }
                        joined
                    }
                };
                parent.result = Some(joined);
            }
        }
    }

    /// Detach the nested evaluation without touching the parent
    pub fn release(self) -> EvalContext<'b> {
        self.inner
    }
}

impl<'b> Deref for Transmit<'b> {
    type Target = EvalContext<'b>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<'b> DerefMut for Transmit<'b> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

//
// Constraint context
//

/// Which slot of an operation a value plays
#[derive(Eq, PartialEq, Copy, Clone, Hash, Debug, Serialize, Deserialize)]
pub enum Argument {
    Result,
    First,
    Second,
}

impl Argument {
    pub fn inverse(self) -> Self {
        match self {
            Self::Result => Self::Result,
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

/// Evaluation context specialized for backward reasoning
///
/// The selector tells which operand the receiver of the call plays; the context holds the
/// other operand and collects the refined operands (`None` means unchanged).
#[derive(Debug)]
pub struct ConstraintContext<'a> {
    eval: EvalContext<'a>,
    selector: Argument,
    first: Option<ScalarElement>,
    second: Option<ScalarElement>,
}

impl<'a> ConstraintContext<'a> {
    pub fn new(params: &EvalParams) -> Self {
        Self {
            eval: EvalContext::new(params),
            selector: Argument::First,
            first: None,
            second: None,
        }
    }

    pub fn with_argument(mut self, argument: &'a ScalarElement) -> Self {
        self.eval.argument = Some(argument);
        self
    }

    pub fn selector(&self) -> Argument {
        self.selector
    }

    pub(crate) fn select(&mut self, selector: Argument) {
        self.selector = selector;
    }

    pub(crate) fn bind_argument(&mut self, argument: &'a ScalarElement) {
        self.eval.argument = Some(argument);
    }

    /// Order the receiver and the held operand as (first, second)
    pub fn operands<'r>(
        &self,
        receiver: &'r ScalarElement,
    ) -> (&'r ScalarElement, Option<&'r ScalarElement>)
    where
        'a: 'r,
    {
        match (self.selector, self.eval.argument) {
            (Argument::Second, Some(source)) => (source, Some(receiver)),
            (_, argument) => (receiver, argument),
        }
    }

    pub fn refine(&mut self, slot: Argument, element: ScalarElement) {
        match slot {
            Argument::Result => self.eval.set_result(element),
            Argument::First => self.first = Some(element),
            Argument::Second => self.second = Some(element),
        }
    }

    pub fn refine_first(&mut self, element: ScalarElement) {
        self.refine(Argument::First, element)
    }

    pub fn refine_second(&mut self, element: ScalarElement) {
        self.refine(Argument::Second, element)
    }

    /// Refine the operand played by the receiver
    pub fn refine_receiver(&mut self, element: ScalarElement) {
        self.refine(self.selector, element)
    }

    /// Refine the operand held by the context
    pub fn refine_source(&mut self, element: ScalarElement) {
        self.refine(self.selector.inverse(), element)
    }

    pub fn first(&self) -> Option<&ScalarElement> {
        self.first.as_ref()
    }

    pub fn second(&self) -> Option<&ScalarElement> {
        self.second.as_ref()
    }

    pub fn take_first(&mut self) -> Option<ScalarElement> {
        self.first.take()
    }

    pub fn take_second(&mut self) -> Option<ScalarElement> {
        self.second.take()
    }

    /// Refined value of a slot, or the given original when the slot was left unchanged
    pub fn refined_or(&self, slot: Argument, original: &ScalarElement) -> ScalarElement {
        let refined = match slot {
            Argument::Result => self.eval.result(),
            Argument::First => self.first.as_ref(),
            Argument::Second => self.second.as_ref(),
        };
        refined.unwrap_or(original).clone()
    }

    /// Open a nested backward evaluation one level deeper
    pub fn fork<'b>(
        &self,
        argument: Option<&'b ScalarElement>,
        selector: Argument,
    ) -> ConstraintContext<'b> {
        let mut eval = EvalContext::new(&self.eval.params);
        eval.argument = argument;
        eval.depth = self.eval.depth + 1;
        ConstraintContext {
            eval,
            selector,
            first: None,
            second: None,
        }
    }

    /// Merge verdict, errors and the instability of a nested evaluation
    pub fn absorb_flags(&mut self, child: &ConstraintContext<'_>) {
        self.eval.absorb_flags(&child.eval);
    }

    /// Merge the flags of a nested evaluation on one alternative of the operands
    pub fn absorb_branch(&mut self, child: &ConstraintContext<'_>) {
        self.eval.absorb_branch(&child.eval);
    }

    /// Take over everything a nested evaluation on the same operands found
    pub fn absorb(&mut self, mut child: ConstraintContext<'_>) {
        self.absorb_flags(&child);
        if child.eval.empty {
            self.set_empty();
            return;
        }
        if let Some(first) = child.first.take() {
            self.first = Some(first);
        }
        if let Some(second) = child.second.take() {
            self.second = Some(second);
        }
    }
}

impl<'a> Deref for ConstraintContext<'a> {
    type Target = EvalContext<'a>;

    fn deref(&self) -> &Self::Target {
        &self.eval
    }
}

impl<'a> DerefMut for ConstraintContext<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.eval
    }
}
