//! Integer constraint models and the search that solves them.

pub mod linear;
pub mod lp;
pub mod model;
mod relax;
pub mod search;

pub use linear::{Constraint, LinearExpr, Literal, Sense, VarId};
pub use lp::emit_lp;
pub use model::{CpModel, VarDef};
pub use search::{
    Budget, CancelToken, Control, EnumerateResult, ObjSense, SearchStats, Solution, SolveResult,
    SolveStatus, Solver, StopReason,
};
