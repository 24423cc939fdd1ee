pub mod operation;
pub mod typing;
