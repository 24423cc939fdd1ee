use std::env;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail};
use datatest_stable::{harness, Result};
use num_bigint::BigInt;
use serde::Deserialize;

use libra_scalar::analysis::context::{
    ConstraintContext, ErrorKind, ErrorPolicy, EvalContext, Information,
};
use libra_scalar::analysis::element::ScalarElement;
use libra_scalar::analysis::generic::Meet;
use libra_scalar::analysis::params::preset;
use libra_scalar::ir::operation::Operation;
use libra_scalar::ir::typing::{FloatType, IntType, ScalarType};
use libra_scalar::EngineResult;
use libra_shared::logging::setup;

/// An abstract value as written in a scenario
#[derive(Deserialize, Debug)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Value {
    Bit { value: bool },
    Int { ty: IntType, value: i64 },
    IntRange { ty: IntType, lo: i64, hi: i64 },
    Disjunction { ty: IntType, values: Vec<i64> },
    Float { ty: FloatType, value: f64 },
    FloatRange { ty: FloatType, lo: f64, hi: f64 },
    Top { ty: ScalarType },
}

impl Value {
    fn build(&self) -> EngineResult<ScalarElement> {
        let element = match self {
            Self::Bit { value } => ScalarElement::bit(*value),
            Self::Int { ty, value } => ScalarElement::int(*ty, *value)?,
            Self::IntRange { ty, lo, hi } => ScalarElement::int_range(*ty, *lo, *hi)?,
            Self::Disjunction { ty, values } => {
                ScalarElement::disjunction(*ty, values.iter().map(|v| BigInt::from(*v)))?
            }
            Self::Float { ty, value } => ScalarElement::float(*ty, *value),
            Self::FloatRange { ty, lo, hi } => ScalarElement::float_range(*ty, *lo, *hi)?,
            Self::Top { ty } => ScalarElement::top(*ty),
        };
        Ok(element)
    }
}

/// What a forward transfer is expected to produce
#[derive(Deserialize, Debug)]
struct Produced {
    result: Option<Value>,
    #[serde(default)]
    empty: bool,
    exact: Option<bool>,
    #[serde(default)]
    possible: Vec<ErrorKind>,
    #[serde(default)]
    certain: Vec<ErrorKind>,
}

/// What a backward refinement is expected to leave; an absent operand is unchanged
#[derive(Deserialize, Debug)]
struct Refined {
    first: Option<Value>,
    second: Option<Value>,
    #[serde(default)]
    empty: bool,
    exact: Option<bool>,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "check", rename_all = "snake_case")]
enum Step {
    Apply {
        receiver: Value,
        argument: Option<Value>,
        operation: Operation,
        expect: Produced,
    },
    Constrain {
        receiver: Value,
        argument: Option<Value>,
        operation: Operation,
        result: Value,
        expect: Refined,
    },
    Join {
        lhs: Value,
        rhs: Value,
        expect: Value,
    },
    /// an absent expectation means the meet is bottom
    Meet {
        lhs: Value,
        rhs: Value,
        expect: Option<Value>,
    },
}

#[derive(Deserialize, Debug)]
struct Scenario {
    information: Information,
    errors: ErrorPolicy,
    steps: Vec<Step>,
}

fn check_element(
    what: &str,
    obtained: Option<&ScalarElement>,
    expected: Option<&Value>,
) -> anyhow::Result<()> {
    let expected = expected.map(|v| v.build()).transpose()?;
    if obtained != expected.as_ref() {
        bail!(
            "{} mismatch: expected {}, obtained {}",
            what,
            expected.map_or_else(|| "nothing".to_string(), |e| e.to_string()),
            obtained.map_or_else(|| "nothing".to_string(), |e| e.to_string()),
        );
    }
    Ok(())
}

fn check_flag(what: &str, obtained: bool, expected: bool) -> anyhow::Result<()> {
    if obtained != expected {
        bail!("{} mismatch: expected {}, obtained {}", what, expected, obtained);
    }
    Ok(())
}

fn run_step(scenario: &Scenario, step: &Step) -> anyhow::Result<()> {
    let params = preset(scenario.information, scenario.errors);
    match step {
        Step::Apply {
            receiver,
            argument,
            operation,
            expect,
        } => {
            let receiver = receiver.build()?;
            let argument = argument.as_ref().map(|v| v.build()).transpose()?;
            let mut ctx = EvalContext::new(params);
            if let Some(argument) = argument.as_ref() {
                ctx = ctx.with_argument(argument);
            }
            if !receiver.apply(operation, &mut ctx) {
                bail!("{} is not supported on {}", operation, receiver);
            }
            check_element("result", ctx.result(), expect.result.as_ref())?;
            check_flag("emptiness", ctx.is_empty(), expect.empty)?;
            if let Some(exact) = expect.exact {
                check_flag("exactness", ctx.is_exact(), exact)?;
            }
            for kind in ErrorKind::ALL {
                check_flag(
                    &format!("possible {:?}", kind),
                    ctx.errors().is_possible(kind),
                    expect.possible.contains(&kind) || expect.certain.contains(&kind),
                )?;
                check_flag(
                    &format!("certain {:?}", kind),
                    ctx.errors().is_certain(kind),
                    expect.certain.contains(&kind),
                )?;
            }
        }
        Step::Constrain {
            receiver,
            argument,
            operation,
            result,
            expect,
        } => {
            let receiver = receiver.build()?;
            let argument = argument.as_ref().map(|v| v.build()).transpose()?;
            let result = result.build()?;
            let mut ctx = ConstraintContext::new(params);
            if let Some(argument) = argument.as_ref() {
                ctx = ctx.with_argument(argument);
            }
            if !receiver.constraint(operation, &result, &mut ctx) {
                bail!("constraint {} is not supported on {}", operation, receiver);
            }
            check_element("first operand", ctx.first(), expect.first.as_ref())?;
            check_element("second operand", ctx.second(), expect.second.as_ref())?;
            check_flag("emptiness", ctx.is_empty(), expect.empty)?;
            if let Some(exact) = expect.exact {
                check_flag("exactness", ctx.is_exact(), exact)?;
            }
        }
        Step::Join { lhs, rhs, expect } => {
            let (lhs, rhs) = (lhs.build()?, rhs.build()?);
            // the join does not depend on which side runs it
            check_element("join", Some(&lhs.join(&rhs)), Some(expect))?;
            check_element("mirrored join", Some(&rhs.join(&lhs)), Some(expect))?;
        }
        Step::Meet { lhs, rhs, expect } => {
            let (lhs, rhs) = (lhs.build()?, rhs.build()?);
            let obtained = match lhs.meet(&rhs) {
                Meet::Bottom => None,
                Meet::Element(e) => Some(e),
            };
            check_element("meet", obtained.as_ref(), expect.as_ref())?;
        }
    }
    Ok(())
}

fn run_scenario(path: &Path) -> Result<()> {
    // config based on environment variable
    let level = env::var("LOG").ok().and_then(|v| v.parse::<usize>().ok());
    let verbose = matches!(level, Some(l) if l > 0);
    if let Some(level) = level {
        // scenarios share the process, only the first one installs the logger
        let _ = setup(Some(level));
    }

    let content = fs::read_to_string(path)?;
    let scenario: Scenario = serde_json::from_str(&content)?;

    let mut failures = vec![];
    for (index, step) in scenario.steps.iter().enumerate() {
        if verbose {
            println!("step {}: {:?}", index, step);
        }
        if let Err(err) = run_step(&scenario, step) {
            failures.push(format!("step {}: {}", index, err));
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("{} step(s) failed\n{}", failures.len(), failures.join("\n")).into())
    }
}

harness!(run_scenario, "tests/scenarios", r".*\.json$");
