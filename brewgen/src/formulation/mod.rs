//! Brewing rules lowered into integer constraint models.

mod grain;
mod hops;

pub use grain::{CategoryVars, GrainFormulation, GrainProblem};
pub use hops::{BucketVars, HopFormulation, HopProblem, HopVars};
