//! Scalar abstract-domain engine: abstract values of bits, fixed-width integers and floats,
//! with forward transfer, backward refinement and the lattice operations between them.

pub use error::{EngineError, EngineResult};

pub mod analysis;
pub mod error;
pub mod ir;
