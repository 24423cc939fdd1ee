use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::ir::typing::{FloatType, IntType, ScalarType, MAX_INT_WIDTH};

/// Discriminant of an operation
///
/// The declaration order is significant: unary operations come first, then comparisons, then
/// binary operations. Dispatch tables rely on this layout to compute dense indices.
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Hash, Debug, Serialize, Deserialize)]
#[repr(u8)]
pub enum OperationKind {
    // unary
    Prev,
    Next,
    Opposite,
    BitNegate,
    LogicalNegate,
    CastBit,
    CastInt,
    CastFloat,
    ExtendWithZero,
    ExtendWithSign,
    Reduce,
    // comparison
    CompareLess,
    CompareLessOrEqual,
    CompareEqual,
    CompareDifferent,
    CompareGreaterOrEqual,
    CompareGreater,
    // binary
    Plus,
    Minus,
    Times,
    Divide,
    Modulo,
    Min,
    Max,
    BitOr,
    BitAnd,
    BitXor,
    LeftShift,
    RightShift,
    LeftRotate,
    RightRotate,
    LogicalAnd,
    LogicalOr,
    Concat,
    BitSet,
}

/// First discriminant of the comparison section
pub const COMPARE_START: usize = OperationKind::CompareLess as usize;
/// First discriminant of the binary section
pub const BINARY_START: usize = OperationKind::Plus as usize;
/// Total number of operation kinds
pub const OPERATION_COUNT: usize = OperationKind::BitSet as usize + 1;

pub const UNARY_COUNT: usize = COMPARE_START;
pub const COMPARE_COUNT: usize = BINARY_START - COMPARE_START;
pub const BINARY_COUNT: usize = OPERATION_COUNT - BINARY_START;

/// Position of an operation in a dispatch table
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum Section {
    Unary(usize),
    Compare(usize),
    Binary(usize),
}

impl OperationKind {
    pub const ALL: [OperationKind; OPERATION_COUNT] = [
        Self::Prev,
        Self::Next,
        Self::Opposite,
        Self::BitNegate,
        Self::LogicalNegate,
        Self::CastBit,
        Self::CastInt,
        Self::CastFloat,
        Self::ExtendWithZero,
        Self::ExtendWithSign,
        Self::Reduce,
        Self::CompareLess,
        Self::CompareLessOrEqual,
        Self::CompareEqual,
        Self::CompareDifferent,
        Self::CompareGreaterOrEqual,
        Self::CompareGreater,
        Self::Plus,
        Self::Minus,
        Self::Times,
        Self::Divide,
        Self::Modulo,
        Self::Min,
        Self::Max,
        Self::BitOr,
        Self::BitAnd,
        Self::BitXor,
        Self::LeftShift,
        Self::RightShift,
        Self::LeftRotate,
        Self::RightRotate,
        Self::LogicalAnd,
        Self::LogicalOr,
        Self::Concat,
        Self::BitSet,
    ];

    /// Dense index of this operation within its section
    pub fn section(self) -> Section {
        let discriminant = self as usize;
        if discriminant < COMPARE_START {
            Section::Unary(discriminant)
        } else if discriminant < BINARY_START {
            Section::Compare(discriminant - COMPARE_START)
        } else {
            Section::Binary(discriminant - BINARY_START)
        }
    }

    pub fn is_compare(self) -> bool {
        matches!(self.section(), Section::Compare(_))
    }

    pub fn is_unary(self) -> bool {
        matches!(self.section(), Section::Unary(_))
    }

    /// Whether `a op b == b op a` holds for every pair of operands
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            Self::Plus
                | Self::Times
                | Self::Min
                | Self::Max
                | Self::BitOr
                | Self::BitAnd
                | Self::BitXor
                | Self::LogicalAnd
                | Self::LogicalOr
                | Self::CompareEqual
                | Self::CompareDifferent
        )
    }

    /// The comparison obtained by swapping the operands (`a < b` iff `b > a`)
    pub fn mirror(self) -> Self {
        match self {
            Self::CompareLess => Self::CompareGreater,
            Self::CompareLessOrEqual => Self::CompareGreaterOrEqual,
            Self::CompareGreaterOrEqual => Self::CompareLessOrEqual,
            Self::CompareGreater => Self::CompareLess,
            kind => kind,
        }
    }

    /// The comparison holding exactly when this one does not (ordered values only)
    pub fn negate(self) -> Self {
        match self {
            Self::CompareLess => Self::CompareGreaterOrEqual,
            Self::CompareLessOrEqual => Self::CompareGreater,
            Self::CompareEqual => Self::CompareDifferent,
            Self::CompareDifferent => Self::CompareEqual,
            Self::CompareGreaterOrEqual => Self::CompareLess,
            Self::CompareGreater => Self::CompareLessOrEqual,
            kind => kind,
        }
    }
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// An operation descriptor: what to compute, with its operation-specific parameters
#[derive(Eq, PartialEq, Copy, Clone, Hash, Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    // unary
    Prev,
    Next,
    Opposite,
    BitNegate,
    LogicalNegate,
    CastBit,
    CastInt { to: IntType },
    CastFloat { to: FloatType },
    ExtendWithZero { extension: u32 },
    ExtendWithSign { extension: u32 },
    /// keep bits `[low, high)`
    Reduce { low: u32, high: u32 },
    // comparison
    CompareLess,
    CompareLessOrEqual,
    CompareEqual,
    CompareDifferent,
    CompareGreaterOrEqual,
    CompareGreater,
    // binary
    Plus,
    Minus,
    Times,
    Divide,
    Modulo,
    Min,
    Max,
    BitOr,
    BitAnd,
    BitXor,
    LeftShift,
    RightShift,
    LeftRotate,
    RightRotate,
    LogicalAnd,
    LogicalOr,
    /// receiver bits on top, argument bits below
    Concat,
    /// overwrite bits `[low, high)` of the receiver with the argument
    BitSet { low: u32, high: u32 },
}

impl Operation {
    pub fn extend_with_zero(extension: u32) -> EngineResult<Self> {
        Self::check_extension(extension)?;
        Ok(Self::ExtendWithZero { extension })
    }

    pub fn extend_with_sign(extension: u32) -> EngineResult<Self> {
        Self::check_extension(extension)?;
        Ok(Self::ExtendWithSign { extension })
    }

    pub fn reduce(low: u32, high: u32) -> EngineResult<Self> {
        Self::check_range(low, high)?;
        Ok(Self::Reduce { low, high })
    }

    pub fn bit_set(low: u32, high: u32) -> EngineResult<Self> {
        Self::check_range(low, high)?;
        Ok(Self::BitSet { low, high })
    }

    fn check_extension(extension: u32) -> EngineResult<()> {
        if extension == 0 || extension >= MAX_INT_WIDTH {
            return Err(EngineError::InvalidOperation(format!(
                "invalid extension by {} bits",
                extension
            )));
        }
        Ok(())
    }

    fn check_range(low: u32, high: u32) -> EngineResult<()> {
        if low >= high || high > MAX_INT_WIDTH {
            return Err(EngineError::InvalidOperation(format!(
                "invalid bit range [{}, {})",
                low, high
            )));
        }
        Ok(())
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Prev => OperationKind::Prev,
            Self::Next => OperationKind::Next,
            Self::Opposite => OperationKind::Opposite,
            Self::BitNegate => OperationKind::BitNegate,
            Self::LogicalNegate => OperationKind::LogicalNegate,
            Self::CastBit => OperationKind::CastBit,
            Self::CastInt { .. } => OperationKind::CastInt,
            Self::CastFloat { .. } => OperationKind::CastFloat,
            Self::ExtendWithZero { .. } => OperationKind::ExtendWithZero,
            Self::ExtendWithSign { .. } => OperationKind::ExtendWithSign,
            Self::Reduce { .. } => OperationKind::Reduce,
            Self::CompareLess => OperationKind::CompareLess,
            Self::CompareLessOrEqual => OperationKind::CompareLessOrEqual,
            Self::CompareEqual => OperationKind::CompareEqual,
            Self::CompareDifferent => OperationKind::CompareDifferent,
            Self::CompareGreaterOrEqual => OperationKind::CompareGreaterOrEqual,
            Self::CompareGreater => OperationKind::CompareGreater,
            Self::Plus => OperationKind::Plus,
            Self::Minus => OperationKind::Minus,
            Self::Times => OperationKind::Times,
            Self::Divide => OperationKind::Divide,
            Self::Modulo => OperationKind::Modulo,
            Self::Min => OperationKind::Min,
            Self::Max => OperationKind::Max,
            Self::BitOr => OperationKind::BitOr,
            Self::BitAnd => OperationKind::BitAnd,
            Self::BitXor => OperationKind::BitXor,
            Self::LeftShift => OperationKind::LeftShift,
            Self::RightShift => OperationKind::RightShift,
            Self::LeftRotate => OperationKind::LeftRotate,
            Self::RightRotate => OperationKind::RightRotate,
            Self::LogicalAnd => OperationKind::LogicalAnd,
            Self::LogicalOr => OperationKind::LogicalOr,
            Self::Concat => OperationKind::Concat,
            Self::BitSet { .. } => OperationKind::BitSet,
        }
    }

    /// Build the parameter-less operation of a kind (`None` for parameterized kinds)
    pub fn from_kind(kind: OperationKind) -> Option<Self> {
        let op = match kind {
            OperationKind::Prev => Self::Prev,
            OperationKind::Next => Self::Next,
            OperationKind::Opposite => Self::Opposite,
            OperationKind::BitNegate => Self::BitNegate,
            OperationKind::LogicalNegate => Self::LogicalNegate,
            OperationKind::CastBit => Self::CastBit,
            OperationKind::CompareLess => Self::CompareLess,
            OperationKind::CompareLessOrEqual => Self::CompareLessOrEqual,
            OperationKind::CompareEqual => Self::CompareEqual,
            OperationKind::CompareDifferent => Self::CompareDifferent,
            OperationKind::CompareGreaterOrEqual => Self::CompareGreaterOrEqual,
            OperationKind::CompareGreater => Self::CompareGreater,
            OperationKind::Plus => Self::Plus,
            OperationKind::Minus => Self::Minus,
            OperationKind::Times => Self::Times,
            OperationKind::Divide => Self::Divide,
            OperationKind::Modulo => Self::Modulo,
            OperationKind::Min => Self::Min,
            OperationKind::Max => Self::Max,
            OperationKind::BitOr => Self::BitOr,
            OperationKind::BitAnd => Self::BitAnd,
            OperationKind::BitXor => Self::BitXor,
            OperationKind::LeftShift => Self::LeftShift,
            OperationKind::RightShift => Self::RightShift,
            OperationKind::LeftRotate => Self::LeftRotate,
            OperationKind::RightRotate => Self::RightRotate,
            OperationKind::LogicalAnd => Self::LogicalAnd,
            OperationKind::LogicalOr => Self::LogicalOr,
            OperationKind::Concat => Self::Concat,
            OperationKind::CastInt
            | OperationKind::CastFloat
            | OperationKind::ExtendWithZero
            | OperationKind::ExtendWithSign
            | OperationKind::Reduce
            | OperationKind::BitSet => return None,
        };
        Some(op)
    }

    /// Number of operands besides the receiver
    pub fn arity(&self) -> usize {
        if self.kind().is_unary() {
            0
        } else {
            1
        }
    }

    /// Whether the operation produces a fresh value instead of assigning into the receiver
    pub fn is_const(&self) -> bool {
        matches!(
            self.kind(),
            OperationKind::CompareLess
                | OperationKind::CompareLessOrEqual
                | OperationKind::CompareEqual
                | OperationKind::CompareDifferent
                | OperationKind::CompareGreaterOrEqual
                | OperationKind::CompareGreater
                | OperationKind::CastBit
                | OperationKind::CastInt
                | OperationKind::CastFloat
                | OperationKind::ExtendWithZero
                | OperationKind::ExtendWithSign
                | OperationKind::Reduce
                | OperationKind::Concat
        )
    }

    /// Bit range `[low, high)` of the bit-range operations
    pub fn bit_range(&self) -> Option<(u32, u32)> {
        match self {
            Self::Reduce { low, high } | Self::BitSet { low, high } => Some((*low, *high)),
            _ => None,
        }
    }

    /// Type of the value produced by applying this operation
    ///
    /// Fails when the operand types are not acceptable for the operation.
    pub fn result_type(
        &self,
        receiver: ScalarType,
        argument: Option<ScalarType>,
    ) -> EngineResult<ScalarType> {
        let mismatch = || {
            EngineError::InvalidOperation(format!(
                "{} not applicable to {}{}",
                self,
                receiver,
                argument.map_or(String::new(), |ty| format!(" and {}", ty))
            ))
        };
        let same_argument = || match argument {
            Some(ty) if ty == receiver => Ok(()),
            _ => Err(mismatch()),
        };
        let integral_argument = || match argument.and_then(|ty| ty.bits_view()) {
            Some(ty) => Ok(ty),
            None => Err(mismatch()),
        };

        let ty = match self {
            Self::Prev | Self::Next | Self::Opposite => receiver,
            Self::BitNegate => {
                receiver.bits_view().ok_or_else(mismatch)?;
                receiver
            }
            Self::LogicalNegate | Self::CastBit => ScalarType::Bit,
            Self::CastInt { to } => ScalarType::Int(*to),
            Self::CastFloat { to } => ScalarType::Float(*to),
            Self::ExtendWithZero { extension } | Self::ExtendWithSign { extension } => {
                let base = receiver.bits_view().ok_or_else(mismatch)?;
                ScalarType::Int(base.with_width(base.width() + extension)?)
            }
            Self::Reduce { low, high } => {
                let base = receiver.bits_view().ok_or_else(mismatch)?;
                if low >= high || *high > base.width() {
                    return Err(mismatch());
                }
                ScalarType::Int(IntType::unsigned(high - low)?)
            }
            Self::CompareLess
            | Self::CompareLessOrEqual
            | Self::CompareEqual
            | Self::CompareDifferent
            | Self::CompareGreaterOrEqual
            | Self::CompareGreater
            | Self::LogicalAnd
            | Self::LogicalOr => {
                same_argument()?;
                ScalarType::Bit
            }
            Self::Plus
            | Self::Minus
            | Self::Times
            | Self::Divide
            | Self::Modulo
            | Self::Min
            | Self::Max => {
                same_argument()?;
                receiver
            }
            Self::BitOr | Self::BitAnd | Self::BitXor => {
                same_argument()?;
                receiver.bits_view().ok_or_else(mismatch)?;
                receiver
            }
            Self::LeftShift | Self::RightShift | Self::LeftRotate | Self::RightRotate => {
                receiver.bits_view().ok_or_else(mismatch)?;
                integral_argument()?;
                receiver
            }
            Self::Concat => {
                let high = receiver.bits_view().ok_or_else(mismatch)?;
                let low = integral_argument()?;
                ScalarType::Int(IntType::unsigned(high.width() + low.width())?)
            }
            Self::BitSet { low, high } => {
                let base = receiver.bits_view().ok_or_else(mismatch)?;
                let patch = integral_argument()?;
                if low >= high || *high > base.width() || patch.width() != high - low {
                    return Err(mismatch());
                }
                receiver
            }
        };
        Ok(ty)
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CastInt { to } => write!(f, "CastInt<{}>", to),
            Self::CastFloat { to } => write!(f, "CastFloat<{}>", to),
            Self::ExtendWithZero { extension } => write!(f, "ExtendWithZero<{}>", extension),
            Self::ExtendWithSign { extension } => write!(f, "ExtendWithSign<{}>", extension),
            Self::Reduce { low, high } => write!(f, "Reduce<{}..{}>", low, high),
            Self::BitSet { low, high } => write!(f, "BitSet<{}..{}>", low, high),
            op => op.kind().fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_are_dense() {
        let mut unary = 0;
        let mut compare = 0;
        let mut binary = 0;
        for kind in OperationKind::ALL {
            match kind.section() {
                Section::Unary(index) => {
                    assert_eq!(index, unary);
                    unary += 1;
                }
                Section::Compare(index) => {
                    assert_eq!(index, compare);
                    compare += 1;
                }
                Section::Binary(index) => {
                    assert_eq!(index, binary);
                    binary += 1;
                }
            }
        }
        assert_eq!(unary, UNARY_COUNT);
        assert_eq!(compare, COMPARE_COUNT);
        assert_eq!(binary, BINARY_COUNT);
    }

    #[test]
    fn kinds_round_trip_through_descriptors() {
        for kind in OperationKind::ALL {
            if let Some(op) = Operation::from_kind(kind) {
                assert_eq!(op.kind(), kind);
            }
        }
    }

    #[test]
    fn result_types() {
        let i32t = ScalarType::Int(IntType::signed(32).unwrap());
        let u8t = ScalarType::Int(IntType::unsigned(8).unwrap());
        assert_eq!(
            Operation::CompareLess.result_type(i32t, Some(i32t)).unwrap(),
            ScalarType::Bit
        );
        assert_eq!(
            Operation::Concat.result_type(u8t, Some(ScalarType::Bit)).unwrap(),
            ScalarType::Int(IntType::unsigned(9).unwrap())
        );
        assert!(Operation::Plus.result_type(i32t, Some(u8t)).is_err());
        assert!(Operation::Reduce { low: 4, high: 12 }
            .result_type(u8t, None)
            .is_err());
        assert!(Operation::reduce(3, 3).is_err());
    }
}
