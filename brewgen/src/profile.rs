//! Request-scoped profiles: style, sensory targets, equipment, beer, hop targets.
//!
//! Nothing here is persisted. Every `validate` runs before model construction so
//! that malformed input never shows up as solver infeasibility.

use crate::bill::TimingBucket;
use crate::error::{check_range, BrewError, Result};
use crate::ingredients::{check_usage, Catalog, Category, Fermentable};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A closed real interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, v: f64) -> bool {
        self.min <= v && v <= self.max
    }
}

/// Min/max of one sensory descriptor, as a target or as a solved range.
///
/// Ranges returned by descriptor-range computation are marginal: each bound
/// is reachable on its own, but the extremes of two descriptors are not
/// necessarily reachable by the same bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensoryRange {
    pub name: String,
    pub min: f64,
    pub max: f64,
}

impl SensoryRange {
    pub fn new(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
        }
    }
}

/// Intensities are non-negative on both sides: targets here, ingredient
/// intensities when a descriptor enters a model.
pub(crate) fn validate_sensory(what: &str, targets: &[SensoryRange]) -> Result<()> {
    let mut seen = HashSet::new();
    for t in targets {
        check_range(&format!("{what} descriptor `{}`", t.name), t.min, t.max)?;
        if t.min < 0.0 {
            return Err(BrewError::bound(format!("{what} descriptor `{}`", t.name), t.min, t.max));
        }
        if !seen.insert(t.name.as_str()) {
            return Err(BrewError::InvalidProfile(format!(
                "{what} descriptor `{}` is listed more than once",
                t.name
            )));
        }
    }
    Ok(())
}

/// Checks categories against the active fermentables.
///
/// Every fermentable's category must be present; category names must be
/// unique; all bounds must be ordered percentages.
pub fn validate_categories(fermentables: &[Fermentable], categories: &[Category]) -> Result<()> {
    let mut names = HashSet::new();
    for c in categories {
        if !names.insert(c.name.as_str()) {
            return Err(BrewError::DuplicateCategory(c.name.clone()));
        }
        check_usage(&format!("category `{}`", c.name), c.min_percent, c.max_percent)?;
    }
    for f in fermentables {
        if !names.contains(f.category.as_str()) {
            return Err(BrewError::UnknownCategory {
                fermentable: f.slug.clone(),
                category: f.category.clone(),
            });
        }
        check_usage(&format!("usage of `{}`", f.slug), f.min_percent, f.max_percent)?;
    }
    Ok(())
}

/// Usage bounds of one fermentable inside a style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageOverride {
    pub slug: String,
    pub min_percent: f64,
    pub max_percent: f64,
}

/// A style: which fermentables, at what usage, in which category proportions,
/// with what sensory targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fermentables: Vec<UsageOverride>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub sensory: Vec<SensoryRange>,
}

impl StyleProfile {
    /// Request-scoped fermentable list: catalog entries cloned with the style's usage.
    pub fn resolve(&self, catalog: &Catalog) -> Result<Vec<Fermentable>> {
        let list = self
            .fermentables
            .iter()
            .map(|u| {
                catalog
                    .fermentable(&u.slug)?
                    .with_usage(u.min_percent, u.max_percent)
            })
            .collect::<Result<Vec<_>>>()?;
        validate_categories(&list, &self.categories)?;
        validate_sensory("sensory target", &self.sensory)?;
        Ok(list)
    }
}

/// Brewing equipment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquipmentProfile {
    /// Mash efficiency as a fraction.
    pub mash_efficiency: f64,
    pub target_volume_gallons: f64,
}

impl EquipmentProfile {
    /// Accepts efficiency as a fraction (`0.73`) or a percent (`73`).
    pub fn new(mash_efficiency: f64, target_volume_gallons: f64) -> Result<Self> {
        let mash_efficiency = if mash_efficiency > 1.0 {
            mash_efficiency / 100.0
        } else {
            mash_efficiency
        };
        let p = Self {
            mash_efficiency,
            target_volume_gallons,
        };
        p.validate()?;
        Ok(p)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.mash_efficiency > 0.0 && self.mash_efficiency <= 1.0) {
            return Err(BrewError::InvalidProfile(format!(
                "mash efficiency {} is not in (0, 1]",
                self.mash_efficiency
            )));
        }
        if !(self.target_volume_gallons > 0.0 && self.target_volume_gallons.is_finite()) {
            return Err(BrewError::InvalidProfile(format!(
                "target volume {} must be positive",
                self.target_volume_gallons
            )));
        }
        Ok(())
    }

    pub fn target_volume_liters(&self) -> f64 {
        self.target_volume_gallons * crate::chemistry::LITERS_PER_GALLON
    }
}

/// Target beer: gravity and acceptable color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeerProfile {
    pub original_sg: f64,
    pub min_color_srm: f64,
    pub max_color_srm: f64,
}

impl BeerProfile {
    pub fn new(original_sg: f64, min_color_srm: f64, max_color_srm: f64) -> Result<Self> {
        let p = Self {
            original_sg,
            min_color_srm,
            max_color_srm,
        };
        p.validate()?;
        Ok(p)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.original_sg > 1.0 && self.original_sg < 2.0) {
            return Err(BrewError::InvalidProfile(format!(
                "original gravity {} is not a specific gravity above 1",
                self.original_sg
            )));
        }
        check_range("color range", self.min_color_srm, self.max_color_srm)?;
        if self.min_color_srm < 0.0 {
            return Err(BrewError::bound("color range", self.min_color_srm, self.max_color_srm));
        }
        Ok(())
    }

    /// Colors are compared after rounding to the nearest SRM.
    pub fn accepts_color(&self, srm: f64) -> bool {
        let r = srm.round();
        self.min_color_srm <= r && r <= self.max_color_srm
    }
}

/// Bitterness / mass / flavor targets, used for a whole recipe or one timing bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HopTarget {
    /// IBU range.
    #[serde(default)]
    pub ibu: Option<Bounds>,
    /// Hop mass range, grams.
    #[serde(default)]
    pub mass: Option<Bounds>,
    /// Per-descriptor flavor ranges.
    #[serde(default)]
    pub flavor: Vec<SensoryRange>,
    #[serde(default)]
    pub max_unique: Option<u32>,
}

impl HopTarget {
    pub fn validate(&self, what: &str) -> Result<()> {
        for (label, b) in [("ibu", &self.ibu), ("mass", &self.mass)] {
            if let Some(b) = b {
                check_range(&format!("{what} {label}"), b.min, b.max)?;
                if b.min < 0.0 {
                    return Err(BrewError::bound(format!("{what} {label}"), b.min, b.max));
                }
            }
        }
        validate_sensory(&format!("{what} flavor"), &self.flavor)
    }
}

/// Target for one timing bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketTarget {
    pub bucket: TimingBucket,
    #[serde(default)]
    pub target: HopTarget,
}
