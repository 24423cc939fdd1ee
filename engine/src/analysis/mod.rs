//
// Scalar abstract domains
//
pub mod lattice;
pub mod sign;
pub mod context;
pub mod params;
pub mod dispatch;
pub mod numeric;
pub mod generic;
pub mod element;
pub mod bits;
pub mod constant;
pub mod range;
pub mod float;
pub mod disjunction;
pub mod top;
pub mod query;
pub mod propagate;
