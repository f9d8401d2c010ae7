//! Beer recipe formulation as integer constraint solving.
//!
//! Fermentables, categories and sensory targets become a [`solver::CpModel`];
//! the [`Formulator`] tests it for feasibility, enumerates grain bills or
//! computes per-descriptor ranges. Hop schedules go through the same modes
//! with a timing-bucket model.

pub mod bill;
pub mod chemistry;
pub mod config;
pub mod error;
pub mod formulation;
pub mod ingredients;
pub mod orchestrator;
pub mod profile;
pub mod scaling;
pub mod solver;

pub use bill::{color_distribution, ColorCount, GrainBill, HopAddition, HopBill, Recipe, RecipeGrain, TimingBucket};
pub use config::BrewgenConfig;
pub use error::{BrewError, Result};
pub use formulation::{GrainFormulation, GrainProblem, HopFormulation, HopProblem};
pub use ingredients::{Catalog, Category, Fermentable, Hop, HopUsage};
pub use orchestrator::{Feasibility, Formulator, Outcome};
pub use profile::{
    BeerProfile, Bounds, BucketTarget, EquipmentProfile, HopTarget, SensoryRange, StyleProfile,
    UsageOverride,
};
pub use solver::CancelToken;
