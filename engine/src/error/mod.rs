use std::error::Error;
use std::fmt::{Display, Formatter};

/// A list of requests not supported (yet) by an element kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unsupported {
    /// A query sub-operation not wired for an element kind
    Query {
        family: &'static str,
        request: &'static str,
        kind: &'static str,
    },
    /// A query that requires a concrete value on a non-singleton element
    NonConstantValue,
}

impl Display for Unsupported {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Query {
                family,
                request,
                kind,
            } => {
                write!(f, "query {}::{} on {} element", family, request, kind)
            }
            Self::NonConstantValue => {
                write!(f, "concrete value of a non-constant element")
            }
        }
    }
}

/// A custom error message for the scalar engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed scalar type (e.g., zero or excessive bit width)
    InvalidType(String),
    /// Malformed operation descriptor or element construction
    InvalidOperation(String),
    /// Operation not supported yet
    NotSupportedYet(Unsupported),
    /// Invariant violation
    InvariantViolation(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidType(msg) => {
                write!(f, "[scalar::type] {}", msg)
            }
            Self::InvalidOperation(msg) => {
                write!(f, "[scalar::operation] {}", msg)
            }
            Self::NotSupportedYet(item) => {
                write!(f, "[scalar::unsupported] {}", item)
            }
            Self::InvariantViolation(msg) => {
                write!(f, "[scalar::invariant] {}", msg)
            }
        }
    }
}

impl Error for EngineError {}

/// Abort on a broken precondition of the engine
///
/// Continuing after such a violation would silently break soundness, hence this always panics.
#[track_caller]
pub fn invariant_violation(msg: impl Into<String>) -> ! {
    panic!("{}", EngineError::InvariantViolation(msg.into()))
}
