//! SL4 solution-file schema: per-variable descriptors (Pass 1) and dense
//! endogenous array reconstruction (Pass 2) — §4.E.

pub mod decode;
pub mod descriptor;

pub use decode::decode_solution;
pub use descriptor::{build_descriptors, ChangeType, VariableDescriptor, VariableType};
