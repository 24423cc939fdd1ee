//! Exhaustive soundness checks over small integer types
//!
//! Every abstract result is compared against a machine-integer model of the operations: a
//! forward transfer must contain every concrete result, and a backward refinement must keep
//! every operand pair whose concrete result meets the constrained one.

use num_bigint::BigInt;

use libra_scalar::analysis::context::{
    ConstraintContext, ErrorKind, ErrorPolicy, EvalContext, EvalParams, Verdict,
};
use libra_scalar::analysis::element::ScalarElement;
use libra_scalar::analysis::generic::Meet;
use libra_scalar::analysis::params::{EXACT_PROPAGATE, EXACT_STOP};
use libra_scalar::ir::operation::Operation;
use libra_scalar::ir::typing::{FloatType, IntType, ScalarType};

const COMPARISONS: [Operation; 6] = [
    Operation::CompareLess,
    Operation::CompareLessOrEqual,
    Operation::CompareEqual,
    Operation::CompareDifferent,
    Operation::CompareGreaterOrEqual,
    Operation::CompareGreater,
];

/// Operations whose argument has the receiver type
fn binary_ops() -> Vec<Operation> {
    let mut ops = vec![
        Operation::Plus,
        Operation::Minus,
        Operation::Times,
        Operation::Divide,
        Operation::Modulo,
        Operation::Min,
        Operation::Max,
        Operation::BitAnd,
        Operation::BitOr,
        Operation::BitXor,
        Operation::LeftShift,
        Operation::RightShift,
        Operation::LeftRotate,
        Operation::RightRotate,
        Operation::LogicalAnd,
        Operation::LogicalOr,
        Operation::Concat,
    ];
    ops.extend_from_slice(&COMPARISONS);
    ops
}

fn unary_ops() -> Vec<Operation> {
    vec![
        Operation::Prev,
        Operation::Next,
        Operation::Opposite,
        Operation::BitNegate,
        Operation::LogicalNegate,
        Operation::CastBit,
        Operation::CastInt { to: IntType::signed(3).unwrap() },
        Operation::CastInt { to: IntType::unsigned(4).unwrap() },
        Operation::CastInt { to: IntType::signed(6).unwrap() },
        Operation::extend_with_zero(2).unwrap(),
        Operation::extend_with_sign(2).unwrap(),
        Operation::reduce(1, 3).unwrap(),
    ]
}

fn small_types() -> Vec<IntType> {
    vec![IntType::signed(4).unwrap(), IntType::unsigned(4).unwrap()]
}

//
// Reference model
//

/// Two's complement arithmetic of one small integer type, on machine integers
#[derive(Clone, Copy, Debug)]
struct Machine {
    width: u32,
    signed: bool,
}

impl Machine {
    fn of(ty: ScalarType) -> Self {
        match ty {
            ScalarType::Bit => Self { width: 1, signed: false },
            ScalarType::Int(ty) => Self { width: ty.width(), signed: ty.is_signed() },
            ScalarType::Float(_) => unreachable!("no integer model of {}", ty),
        }
    }

    fn modulus(&self) -> i64 {
        1 << self.width
    }

    fn min(&self) -> i64 {
        if self.signed {
            -(self.modulus() / 2)
        } else {
            0
        }
    }

    fn max(&self) -> i64 {
        if self.signed {
            self.modulus() / 2 - 1
        } else {
            self.modulus() - 1
        }
    }

    fn values(&self) -> Vec<i64> {
        (self.min()..=self.max()).collect()
    }

    fn bits(&self, value: i64) -> i64 {
        value.rem_euclid(self.modulus())
    }

    fn wrap(&self, value: i64) -> i64 {
        let bits = self.bits(value);
        if bits > self.max() {
            bits - self.modulus()
        } else {
            bits
        }
    }

    fn fits(&self, value: i64) -> bool {
        self.min() <= value && value <= self.max()
    }

    fn rotate_left(&self, value: i64, amount: i64) -> i64 {
        let k = amount.rem_euclid(self.width as i64);
        let bits = self.bits(value);
        let rotated = ((bits << k) | (bits >> (self.width as i64 - k))) & (self.modulus() - 1);
        self.wrap(rotated)
    }
}

/// What one concrete execution yields
#[derive(Clone, Copy, Debug, PartialEq)]
enum Outcome {
    Value(i64),
    /// the execution stops on an error
    Pruned,
    /// the execution continues past an error with an arbitrary value
    Anything,
}

fn reference(
    params: &EvalParams,
    op: &Operation,
    x_ty: ScalarType,
    a: i64,
    y_ty: Option<ScalarType>,
    b: i64,
) -> Outcome {
    let stop = params.errors == ErrorPolicy::Stop;
    let m = Machine::of(x_ty);
    let n = y_ty.map_or(m, Machine::of);
    let fault = if stop { Outcome::Pruned } else { Outcome::Anything };
    let checked = |machine: Machine, value: i64| {
        if machine.fits(value) {
            Outcome::Value(value)
        } else if stop {
            Outcome::Pruned
        } else {
            Outcome::Value(machine.wrap(value))
        }
    };
    let truth = |holds: bool| Outcome::Value(holds as i64);
    let mask = |count: u32| (1i64 << count) - 1;

    match op {
        Operation::Prev => checked(m, a - 1),
        Operation::Next => checked(m, a + 1),
        Operation::Opposite => checked(m, -a),
        Operation::BitNegate => Outcome::Value(m.wrap(!a)),
        Operation::LogicalNegate => truth(a == 0),
        Operation::CastBit => truth(a != 0),
        Operation::CastInt { to } => checked(Machine::of(ScalarType::Int(*to)), a),
        Operation::CastFloat { .. } => unreachable!("float results have no integer model"),
        Operation::ExtendWithZero { .. } => Outcome::Value(m.bits(a)),
        Operation::ExtendWithSign { extension } => {
            let signed = Machine { signed: true, ..m }.wrap(a);
            Outcome::Value(Machine { width: m.width + extension, ..m }.wrap(signed))
        }
        Operation::Reduce { low, high } => Outcome::Value((m.bits(a) >> low) & mask(high - low)),
        Operation::CompareLess => truth(a < b),
        Operation::CompareLessOrEqual => truth(a <= b),
        Operation::CompareEqual => truth(a == b),
        Operation::CompareDifferent => truth(a != b),
        Operation::CompareGreaterOrEqual => truth(a >= b),
        Operation::CompareGreater => truth(a > b),
        Operation::Plus => checked(m, a + b),
        Operation::Minus => checked(m, a - b),
        Operation::Times => checked(m, a * b),
        Operation::Divide | Operation::Modulo if b == 0 => fault,
        Operation::Divide => checked(m, a / b),
        Operation::Modulo => Outcome::Value(a % b),
        Operation::Min => Outcome::Value(a.min(b)),
        Operation::Max => Outcome::Value(a.max(b)),
        Operation::BitOr => Outcome::Value(m.wrap(a | b)),
        Operation::BitAnd => Outcome::Value(m.wrap(a & b)),
        Operation::BitXor => Outcome::Value(m.wrap(a ^ b)),
        Operation::LeftShift | Operation::RightShift if b < 0 || b >= m.width as i64 => fault,
        Operation::LeftShift => Outcome::Value(m.wrap(a << b)),
        Operation::RightShift => Outcome::Value(a >> b),
        Operation::LeftRotate => Outcome::Value(m.rotate_left(a, b)),
        Operation::RightRotate => Outcome::Value(m.rotate_left(a, -b)),
        Operation::LogicalAnd => truth(a != 0 && b != 0),
        Operation::LogicalOr => truth(a != 0 || b != 0),
        Operation::Concat => Outcome::Value((m.bits(a) << n.width) | n.bits(b)),
        Operation::BitSet { low, high } => {
            let field = mask(high - low) << low;
            Outcome::Value(m.wrap((m.bits(a) & !field) | (n.bits(b) << low)))
        }
    }
}

//
// Elements
//

fn range(ty: &IntType, (lo, hi): (i64, i64)) -> ScalarElement {
    ScalarElement::int_range(*ty, lo, hi).unwrap()
}

fn int(ty: &IntType, value: i64) -> ScalarElement {
    ScalarElement::int(*ty, value).unwrap()
}

fn set(ty: &IntType, values: &[i64]) -> ScalarElement {
    ScalarElement::disjunction(*ty, values.iter().map(|v| BigInt::from(*v))).unwrap()
}

fn constant_of(ty: ScalarType, value: i64) -> ScalarElement {
    match ty {
        ScalarType::Bit => ScalarElement::bit(value != 0),
        ScalarType::Int(ty) => int(&ty, value),
        ScalarType::Float(_) => unreachable!("no integer constant of {}", ty),
    }
}

/// The concrete values an element stands for
fn members(element: &ScalarElement) -> Vec<i64> {
    Machine::of(element.scalar_type())
        .values()
        .into_iter()
        .filter(|v| element.contains_int(&BigInt::from(*v)))
        .collect()
}

/// Every range of the type
fn all_ranges(ty: &IntType) -> Vec<(i64, i64)> {
    let all = Machine::of(ScalarType::Int(*ty)).values();
    let mut ranges = vec![];
    for (i, lo) in all.iter().enumerate() {
        for hi in &all[i..] {
            ranges.push((*lo, *hi));
        }
    }
    ranges
}

/// Ranges of a few widths, constants included
fn sampled_ranges(ty: &IntType) -> Vec<(i64, i64)> {
    all_ranges(ty)
        .into_iter()
        .filter(|(lo, hi)| matches!(hi - lo, 0 | 2 | 5 | 15))
        .collect()
}

/// One element of each integer kind
fn kinds(ty: &IntType) -> Vec<ScalarElement> {
    let v = Machine::of(ScalarType::Int(*ty)).values();
    vec![
        int(ty, v[0]),
        int(ty, v[6]),
        int(ty, v[15]),
        range(ty, (v[2], v[6])),
        range(ty, (v[7], v[12])),
        set(ty, &[v[0], v[15]]),
        set(ty, &[v[1], v[4], v[9]]),
        set(ty, &[v[7], v[8], v[10]]),
        ScalarElement::top(ScalarType::Int(*ty)),
    ]
}

/// Results to refine against: both bits, or short ranges spread over the integer type
fn result_targets(result: ScalarType) -> Vec<ScalarElement> {
    match result {
        ScalarType::Bit => vec![ScalarElement::bit(false), ScalarElement::bit(true)],
        ScalarType::Int(ty) => {
            let machine = Machine::of(result);
            let stride = 1 << ty.width().saturating_sub(4);
            machine
                .values()
                .into_iter()
                .filter(|lo| (lo - machine.min()) % stride == 0)
                .flat_map(|lo| [(lo, lo), (lo, lo + 3)])
                .filter(|(_, hi)| *hi <= machine.max())
                .map(|r| range(&ty, r))
                .collect()
        }
        ScalarType::Float(_) => unreachable!("no integer targets of {}", result),
    }
}

//
// Checks
//

/// One concrete execution that is not pruned; `outcome` is `None` for an arbitrary value
struct Run {
    a: ScalarElement,
    b: Option<ScalarElement>,
    outcome: Option<ScalarElement>,
}

fn executions(
    params: &EvalParams,
    x: &ScalarElement,
    op: &Operation,
    y: Option<&ScalarElement>,
) -> Vec<Run> {
    let x_ty = x.scalar_type();
    let y_ty = y.map(|y| y.scalar_type());
    let result = op.result_type(x_ty, y_ty).unwrap();
    let seconds: Vec<Option<i64>> = match y {
        None => vec![None],
        Some(y) => members(y).into_iter().map(Some).collect(),
    };
    let mut runs = vec![];
    for a in members(x) {
        for &b in &seconds {
            let outcome = match reference(params, op, x_ty, a, y_ty, b.unwrap_or(0)) {
                Outcome::Pruned => continue,
                Outcome::Anything => None,
                Outcome::Value(value) => Some(constant_of(result, value)),
            };
            runs.push(Run {
                a: constant_of(x_ty, a),
                b: b.zip(y_ty).map(|(b, ty)| constant_of(ty, b)),
                outcome,
            });
        }
    }
    runs
}

/// Forward transfer: the abstract result covers every concrete one
fn check_forward(
    params: &EvalParams,
    x: &ScalarElement,
    op: &Operation,
    y: Option<&ScalarElement>,
    runs: &[Run],
) {
    let mut ctx = EvalContext::new(params);
    if let Some(y) = y {
        ctx = ctx.with_argument(y);
    }
    assert!(x.apply(op, &mut ctx), "{} not supported on {}", op, x);
    let abstracted = ctx.result().cloned();
    if abstracted.is_none() && !ctx.is_empty() {
        // not performed under the creation bound
        return;
    }

    for run in runs {
        let result = match &abstracted {
            None => panic!("{} {} {:?} pruned, but {} {:?} runs", x, op, y, run.a, run.b),
            Some(result) => result,
        };
        if let Some(expected) = &run.outcome {
            assert!(
                result.contains(expected),
                "{} {} {:?} = {} misses {} {:?} = {}",
                x,
                op,
                y,
                result,
                run.a,
                run.b,
                expected
            );
        }
    }
}

/// Backward refinement: every operand pair reaching `z` survives
fn check_backward(
    params: &EvalParams,
    x: &ScalarElement,
    op: &Operation,
    y: Option<&ScalarElement>,
    z: &ScalarElement,
    runs: &[Run],
) {
    let mut ctx = ConstraintContext::new(params);
    if let Some(y) = y {
        ctx = ctx.with_argument(y);
    }
    assert!(x.constraint(op, z, &mut ctx), "constraint {} not supported on {}", op, x);
    let first = ctx.first().cloned().unwrap_or_else(|| x.clone());
    let second = ctx.second().cloned().or_else(|| y.cloned());
    let empty = ctx.is_empty();

    for run in runs {
        let reached = run
            .outcome
            .as_ref()
            .map_or(true, |outcome| outcome.meet(z) != Meet::Bottom);
        if !reached {
            continue;
        }
        assert!(
            !empty,
            "{} {} {:?} = {} refined to nothing, {} {:?} reaches it",
            x, op, y, z, run.a, run.b
        );
        assert!(
            first.contains(&run.a),
            "{} {} {:?} = {} drops first operand {}",
            x,
            op,
            y,
            z,
            run.a
        );
        if let (Some(second), Some(b)) = (&second, &run.b) {
            assert!(
                second.contains(b),
                "{} {} {:?} = {} drops second operand {}",
                x,
                op,
                y,
                z,
                b
            );
        }
    }
}

/// Both directions of one operation, against every target of its result type
fn check_both(params: &EvalParams, x: &ScalarElement, op: &Operation, y: Option<&ScalarElement>) {
    let runs = executions(params, x, op, y);
    check_forward(params, x, op, y, &runs);
    let result = op.result_type(x.scalar_type(), y.map(|y| y.scalar_type())).unwrap();
    for z in result_targets(result) {
        check_backward(params, x, op, y, &z, &runs);
    }
}

//
// Integer operations
//

#[test]
fn unary_transfer_is_sound() {
    for params in [&*EXACT_STOP, &*EXACT_PROPAGATE] {
        for ty in small_types() {
            for op in &unary_ops() {
                for x in all_ranges(&ty) {
                    let x = range(&ty, x);
                    let runs = executions(params, &x, op, None);
                    check_forward(params, &x, op, None, &runs);
                }
            }
        }
    }
}

#[test]
fn binary_transfer_is_sound() {
    for params in [&*EXACT_STOP, &*EXACT_PROPAGATE] {
        for ty in small_types() {
            for op in &binary_ops() {
                for x in all_ranges(&ty) {
                    for y in sampled_ranges(&ty) {
                        let (x, y) = (range(&ty, x), range(&ty, y));
                        let runs = executions(params, &x, op, Some(&y));
                        check_forward(params, &x, op, Some(&y), &runs);
                    }
                }
            }
        }
    }
}

#[test]
fn unary_refinement_is_sound() {
    for params in [&*EXACT_STOP, &*EXACT_PROPAGATE] {
        for ty in small_types() {
            for op in &unary_ops() {
                let result = op.result_type(ScalarType::Int(ty), None).unwrap();
                let targets = result_targets(result);
                for x in all_ranges(&ty) {
                    let x = range(&ty, x);
                    let runs = executions(params, &x, op, None);
                    for z in &targets {
                        check_backward(params, &x, op, None, z, &runs);
                    }
                }
            }
        }
    }
}

#[test]
fn binary_refinement_is_sound() {
    for params in [&*EXACT_STOP, &*EXACT_PROPAGATE] {
        for ty in small_types() {
            for op in &binary_ops() {
                let result = op
                    .result_type(ScalarType::Int(ty), Some(ScalarType::Int(ty)))
                    .unwrap();
                let targets = result_targets(result);
                for x in sampled_ranges(&ty) {
                    for y in sampled_ranges(&ty) {
                        let (x, y) = (range(&ty, x), range(&ty, y));
                        let runs = executions(params, &x, op, Some(&y));
                        for z in &targets {
                            check_backward(params, &x, op, Some(&y), z, &runs);
                        }
                    }
                }
            }
        }
    }
}

#[test]
fn bit_set_is_sound() {
    let patch = IntType::unsigned(2).unwrap();
    let op = Operation::bit_set(1, 3).unwrap();
    for params in [&*EXACT_STOP, &*EXACT_PROPAGATE] {
        for ty in small_types() {
            for x in sampled_ranges(&ty) {
                for y in all_ranges(&patch) {
                    check_both(params, &range(&ty, x), &op, Some(&range(&patch, y)));
                }
            }
        }
    }
}

#[test]
fn every_kind_transfers_and_refines_soundly() {
    for params in [&*EXACT_STOP, &*EXACT_PROPAGATE] {
        for ty in small_types() {
            let kinds = kinds(&ty);
            for x in &kinds {
                for op in &unary_ops() {
                    check_both(params, x, op, None);
                }
                for y in &kinds {
                    for op in &binary_ops() {
                        check_both(params, x, op, Some(y));
                    }
                }
            }
        }
    }
}

#[test]
fn bit_operations_are_sound() {
    let (f, t) = (ScalarElement::bit(false), ScalarElement::bit(true));
    let any = ScalarElement::top(ScalarType::Bit);
    let mut ops = vec![
        Operation::Plus,
        Operation::Minus,
        Operation::Times,
        Operation::BitAnd,
        Operation::BitOr,
        Operation::BitXor,
        Operation::LogicalAnd,
        Operation::LogicalOr,
    ];
    ops.extend_from_slice(&COMPARISONS);
    for params in [&*EXACT_STOP, &*EXACT_PROPAGATE] {
        for x in [&f, &t] {
            for op in &[Operation::BitNegate, Operation::LogicalNegate, Operation::CastBit] {
                check_both(params, x, op, None);
            }
            for y in [&f, &t, &any] {
                for op in &ops {
                    check_both(params, x, op, Some(y));
                }
            }
        }
    }
}

#[test]
fn propagated_overflow_degrades() {
    let ops = [Operation::Plus, Operation::Minus, Operation::Times, Operation::Divide];
    for ty in small_types() {
        let machine = Machine::of(ScalarType::Int(ty));
        for op in &ops {
            for a in machine.values() {
                for b in machine.values() {
                    let exact = match op {
                        Operation::Plus => a + b,
                        Operation::Minus => a - b,
                        Operation::Times => a * b,
                        _ if b == 0 => continue,
                        _ => a / b,
                    };
                    if machine.fits(exact) {
                        continue;
                    }
                    let (x, y) = (int(&ty, a), int(&ty, b));
                    let kind = if exact > machine.max() {
                        ErrorKind::PositiveOverflow
                    } else {
                        ErrorKind::NegativeOverflow
                    };

                    let mut ctx = EvalContext::new(&EXACT_PROPAGATE).with_argument(&y);
                    assert!(x.apply(op, &mut ctx));
                    assert_eq!(ctx.result(), Some(&int(&ty, machine.wrap(exact))));
                    assert_eq!(ctx.verdict(), Verdict::Degraded, "{} {} {} kept exact", x, op, y);
                    assert!(ctx.errors().is_certain(kind), "{} {} {} misses {:?}", x, op, y, kind);

                    let mut ctx = EvalContext::new(&EXACT_STOP).with_argument(&y);
                    assert!(x.apply(op, &mut ctx));
                    assert!(ctx.is_empty(), "{} {} {} not pruned", x, op, y);
                    assert!(ctx.errors().is_certain(kind));
                }
            }
        }
    }

    // a range that wraps as a whole stays an interval, but no longer exactly
    let ty = IntType::signed(4).unwrap();
    let (x, y) = (range(&ty, (5, 6)), int(&ty, 4));
    let mut ctx = EvalContext::new(&EXACT_PROPAGATE).with_argument(&y);
    assert!(x.apply(&Operation::Plus, &mut ctx));
    assert_eq!(ctx.result(), Some(&range(&ty, (-7, -6))));
    assert_eq!(ctx.verdict(), Verdict::Degraded);
}

//
// Lattice laws
//

fn lattice_samples() -> Vec<ScalarElement> {
    let ty = IntType::signed(4).unwrap();
    let mut samples: Vec<ScalarElement> = sampled_ranges(&ty)
        .into_iter()
        .filter(|(lo, hi)| hi - lo != 5 || lo % 3 == 0)
        .map(|r| range(&ty, r))
        .collect();
    for values in [vec![-8, 7], vec![0, 3], vec![-3, 1, 5]] {
        samples.push(set(&ty, &values));
    }
    samples.push(ScalarElement::top(ScalarType::Int(ty)));
    samples
}

#[test]
fn join_is_an_upper_bound() {
    let samples = lattice_samples();
    for a in &samples {
        for b in &samples {
            let joined = a.join(b);
            assert!(joined.contains(a), "{} join {} = {} misses {}", a, b, joined, a);
            assert!(joined.contains(b), "{} join {} = {} misses {}", a, b, joined, b);
            assert_eq!(joined, b.join(a), "join of {} and {} is not symmetric", a, b);
        }
    }
}

#[test]
fn meet_is_a_lower_bound() {
    let samples = lattice_samples();
    for a in &samples {
        assert_eq!(a.meet(a), Meet::Element(a.clone()));
        assert!(a.contains(a));
        for b in &samples {
            match a.meet(b) {
                Meet::Bottom => {
                    let common = (-8..=7)
                        .map(BigInt::from)
                        .any(|v| a.contains_int(&v) && b.contains_int(&v));
                    assert!(!common, "{} meet {} is empty but they share a value", a, b);
                }
                Meet::Element(met) => {
                    assert!(a.contains(&met), "{} meet {} = {} escapes {}", a, b, met, a);
                    assert!(b.contains(&met), "{} meet {} = {} escapes {}", a, b, met, b);
                }
            }
        }
    }
}

//
// Floats
//

fn float_reference(op: &Operation, a: f64, b: f64) -> f64 {
    match op {
        Operation::Plus => a + b,
        Operation::Minus => a - b,
        Operation::Times => a * b,
        Operation::Min => a.min(b),
        Operation::Max => a.max(b),
        _ => unreachable!("no float model of {}", op),
    }
}

#[test]
fn float_arithmetic_is_sound() {
    let ty = FloatType::DOUBLE;
    let points = [-3.5, -1.0, -0.25, 0.5, 2.0, 7.75];
    let mut ranges = vec![];
    for (i, lo) in points.iter().enumerate() {
        for hi in &points[i..] {
            ranges.push((*lo, *hi));
        }
    }
    let ops = [Operation::Plus, Operation::Minus, Operation::Times, Operation::Min, Operation::Max];
    for params in [&*EXACT_STOP, &*EXACT_PROPAGATE] {
        for op in &ops {
            for x in &ranges {
                for y in &ranges {
                    let xe = ScalarElement::float_range(ty, x.0, x.1).unwrap();
                    let ye = ScalarElement::float_range(ty, y.0, y.1).unwrap();
                    let mut ctx = EvalContext::new(params).with_argument(&ye);
                    assert!(xe.apply(op, &mut ctx), "{} not supported on {}", op, xe);
                    let result = ctx.result().cloned().unwrap();
                    for a in points.iter().filter(|p| x.0 <= **p && **p <= x.1) {
                        for b in points.iter().filter(|p| y.0 <= **p && **p <= y.1) {
                            let expected = ScalarElement::float(ty, float_reference(op, *a, *b));
                            assert!(
                                result.contains(&expected),
                                "{} {} {} = {} misses {} {} {} = {}",
                                xe,
                                op,
                                ye,
                                result,
                                a,
                                op,
                                b,
                                expected
                            );
                        }
                    }
                }
            }
        }
    }
}
