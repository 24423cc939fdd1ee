use std::fmt::{Display, Formatter};

use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Widest integer a scalar may hold
pub const MAX_INT_WIDTH: u32 = 128;

/// The underlying representation of the bitvec
#[derive(Eq, PartialEq, Copy, Clone, Debug, Serialize, Deserialize)]
pub enum NumRepr {
    Int,
    Float,
}

impl Display for NumRepr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
        }
    }
}

/// 2^n as a big integer
pub fn pow2(n: u32) -> BigInt {
    BigInt::one() << n
}

#[derive(Deserialize)]
struct IntTypeRepr {
    width: u32,
    signed: bool,
}

/// A fixed-width two's complement integer type
#[derive(Eq, PartialEq, Copy, Clone, Hash, Debug, Serialize, Deserialize)]
#[serde(try_from = "IntTypeRepr")]
pub struct IntType {
    width: u32,
    signed: bool,
}

impl TryFrom<IntTypeRepr> for IntType {
    type Error = EngineError;

    fn try_from(repr: IntTypeRepr) -> EngineResult<Self> {
        Self::new(repr.width, repr.signed)
    }
}

impl IntType {
    pub fn new(width: u32, signed: bool) -> EngineResult<Self> {
        if width == 0 || width > MAX_INT_WIDTH {
            return Err(EngineError::InvalidType(format!(
                "integer width {} out of range [1, {}]",
                width, MAX_INT_WIDTH
            )));
        }
        Ok(Self { width, signed })
    }

    pub fn signed(width: u32) -> EngineResult<Self> {
        Self::new(width, true)
    }

    pub fn unsigned(width: u32) -> EngineResult<Self> {
        Self::new(width, false)
    }

    /// A bit seen as an unsigned one-bit integer
    pub const fn bit_view() -> Self {
        Self {
            width: 1,
            signed: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// Same width, different interpretation of the sign bit
    pub fn with_signedness(&self, signed: bool) -> Self {
        Self {
            width: self.width,
            signed,
        }
    }

    /// Same signedness, different width
    pub fn with_width(&self, width: u32) -> EngineResult<Self> {
        Self::new(width, self.signed)
    }

    /// Number of distinct values, i.e., 2^width
    pub fn modulus(&self) -> BigInt {
        pow2(self.width)
    }

    pub fn min_value(&self) -> BigInt {
        if self.signed {
            -pow2(self.width - 1)
        } else {
            BigInt::zero()
        }
    }

    pub fn max_value(&self) -> BigInt {
        if self.signed {
            pow2(self.width - 1) - 1
        } else {
            pow2(self.width) - 1
        }
    }

    /// The value whose bit pattern is all ones
    pub fn all_ones(&self) -> BigInt {
        if self.signed {
            -BigInt::one()
        } else {
            self.max_value()
        }
    }

    pub fn contains(&self, value: &BigInt) -> bool {
        value >= &self.min_value() && value <= &self.max_value()
    }

    /// Two's complement wrap-around of an arbitrary integer into this type
    pub fn wrap(&self, value: &BigInt) -> BigInt {
        self.from_bits(&self.to_bits(value))
    }

    /// The unsigned bit pattern of a value, in `[0, 2^width)`
    pub fn to_bits(&self, value: &BigInt) -> BigInt {
        let modulus = self.modulus();
        let mut bits = value % &modulus;
        if bits.is_negative() {
            bits += &modulus;
        }
        bits
    }

    /// Interpret an unsigned bit pattern in `[0, 2^width)` as a value of this type
    pub fn from_bits(&self, bits: &BigInt) -> BigInt {
        if self.signed && bits >= &pow2(self.width - 1) {
            bits - self.modulus()
        } else {
            bits.clone()
        }
    }
}

impl Display for IntType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.signed {
            write!(f, "i{}", self.width)
        } else {
            write!(f, "u{}", self.width)
        }
    }
}

#[derive(Deserialize)]
struct FloatTypeRepr {
    width: u32,
}

/// An IEEE-754 binary floating point type (single or double precision)
#[derive(Eq, PartialEq, Copy, Clone, Hash, Debug, Serialize, Deserialize)]
#[serde(try_from = "FloatTypeRepr")]
pub struct FloatType {
    width: u32,
}

impl TryFrom<FloatTypeRepr> for FloatType {
    type Error = EngineError;

    fn try_from(repr: FloatTypeRepr) -> EngineResult<Self> {
        Self::new(repr.width)
    }
}

impl FloatType {
    pub const SINGLE: FloatType = FloatType { width: 32 };
    pub const DOUBLE: FloatType = FloatType { width: 64 };

    pub fn new(width: u32) -> EngineResult<Self> {
        match width {
            32 | 64 => Ok(Self { width }),
            _ => Err(EngineError::InvalidType(format!(
                "unsupported float width {}",
                width
            ))),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Round a double to the nearest value of this type
    pub fn round(&self, value: f64) -> f64 {
        if self.width == 32 {
            value as f32 as f64
        } else {
            value
        }
    }

    pub fn max_finite(&self) -> f64 {
        if self.width == 32 {
            f32::MAX as f64
        } else {
            f64::MAX
        }
    }

    pub fn min_positive(&self) -> f64 {
        if self.width == 32 {
            f32::MIN_POSITIVE as f64
        } else {
            f64::MIN_POSITIVE
        }
    }

    /// The smallest value of this type strictly greater than `value`
    pub fn next_up(&self, value: f64) -> f64 {
        if self.width == 32 {
            next_up_f32(value as f32) as f64
        } else {
            next_up_f64(value)
        }
    }

    /// The largest value of this type strictly less than `value`
    pub fn next_down(&self, value: f64) -> f64 {
        -self.next_up(-value)
    }
}

fn next_up_f64(value: f64) -> f64 {
    if value.is_nan() || value == f64::INFINITY {
        return value;
    }
    if value == 0.0 {
        return f64::from_bits(1);
    }
    let bits = value.to_bits();
    if value > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

fn next_up_f32(value: f32) -> f32 {
    if value.is_nan() || value == f32::INFINITY {
        return value;
    }
    if value == 0.0 {
        return f32::from_bits(1);
    }
    let bits = value.to_bits();
    if value > 0.0 {
        f32::from_bits(bits + 1)
    } else {
        f32::from_bits(bits - 1)
    }
}

impl Display for FloatType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "f{}", self.width)
    }
}

/// The type of a machine scalar
#[derive(Eq, PartialEq, Copy, Clone, Hash, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScalarType {
    Bit,
    Int(IntType),
    Float(FloatType),
}

impl ScalarType {
    pub fn width(&self) -> u32 {
        match self {
            Self::Bit => 1,
            Self::Int(ty) => ty.width(),
            Self::Float(ty) => ty.width(),
        }
    }

    pub fn repr(&self) -> NumRepr {
        match self {
            Self::Bit | Self::Int(_) => NumRepr::Int,
            Self::Float(_) => NumRepr::Float,
        }
    }

    pub fn as_int(&self) -> Option<IntType> {
        match self {
            Self::Int(ty) => Some(*ty),
            Self::Bit | Self::Float(_) => None,
        }
    }

    pub fn as_float(&self) -> Option<FloatType> {
        match self {
            Self::Float(ty) => Some(*ty),
            Self::Bit | Self::Int(_) => None,
        }
    }

    /// View bits and integers uniformly as integer types (a bit is an unsigned 1-bit integer)
    pub fn bits_view(&self) -> Option<IntType> {
        match self {
            Self::Bit => Some(IntType::bit_view()),
            Self::Int(ty) => Some(*ty),
            Self::Float(_) => None,
        }
    }
}

impl Display for ScalarType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bit => write!(f, "bit"),
            Self::Int(ty) => ty.fmt(f),
            Self::Float(ty) => ty.fmt(f),
        }
    }
}
