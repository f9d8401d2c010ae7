//! Runtime configuration: solver budgets and request defaults.

use crate::error::Result;
use crate::profile::{BeerProfile, EquipmentProfile};
use crate::solver::{Budget, CancelToken};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Wall-clock budgets per mode, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub feasibility_budget_ms: u64,
    pub enumeration_budget_ms: u64,
    pub optimization_budget_ms: u64,
    /// Stop enumerating after this many bills.
    pub max_solutions: Option<usize>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            feasibility_budget_ms: 10_000,
            enumeration_budget_ms: 1_000,
            optimization_budget_ms: 10_000,
            max_solutions: None,
        }
    }
}

/// Values used when a request leaves them out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub max_unique_grains: u32,
    pub max_unique_hops: u32,
    pub target_volume_gallons: f64,
    /// Fraction or percent, see [`EquipmentProfile::new`].
    pub mash_efficiency: f64,
    pub original_sg: f64,
    pub min_color_srm: f64,
    pub max_color_srm: f64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            max_unique_grains: 4,
            max_unique_hops: 4,
            target_volume_gallons: 5.5,
            mash_efficiency: 75.0,
            original_sg: 1.050,
            min_color_srm: 3.0,
            max_color_srm: 10.0,
        }
    }
}

impl Defaults {
    pub fn equipment(&self) -> Result<EquipmentProfile> {
        EquipmentProfile::new(self.mash_efficiency, self.target_volume_gallons)
    }

    pub fn beer(&self) -> Result<BeerProfile> {
        BeerProfile::new(self.original_sg, self.min_color_srm, self.max_color_srm)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrewgenConfig {
    pub solver: SolverConfig,
    pub defaults: Defaults,
}

impl BrewgenConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn feasibility_budget(&self, cancel: Option<&CancelToken>) -> Budget {
        budget(self.solver.feasibility_budget_ms, cancel)
    }

    pub fn enumeration_budget(&self, cancel: Option<&CancelToken>) -> Budget {
        budget(self.solver.enumeration_budget_ms, cancel)
    }

    pub fn optimization_budget(&self, cancel: Option<&CancelToken>) -> Budget {
        budget(self.solver.optimization_budget_ms, cancel)
    }
}

fn budget(ms: u64, cancel: Option<&CancelToken>) -> Budget {
    Budget {
        time_limit: Some(Duration::from_millis(ms)),
        cancel: cancel.cloned(),
    }
}
