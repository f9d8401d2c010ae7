//! Ingredient data model and catalog.
//!
//! The catalog is read-only once built. Request-scoped changes (usage bounds
//! from a style profile) are made on clones via [`Fermentable::with_usage`].

use crate::chemistry::gravity_points;
use crate::error::{check_range, BrewError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A sugar source: malt, adjunct, sugar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fermentable {
    pub name: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub slug: String,
    pub category: String,
    /// Potential extract as specific gravity (1 lb in 1 gal), e.g. `1.037`.
    pub potential: f64,
    /// Color in degrees Lovibond.
    pub color: f64,
    #[serde(default)]
    pub min_percent: f64,
    #[serde(default = "default_max_percent")]
    pub max_percent: f64,
    /// Sensory descriptor -> intensity. Missing descriptors are zero.
    #[serde(default, alias = "sensory_data")]
    pub sensory: BTreeMap<String, f64>,
}

fn default_max_percent() -> f64 {
    100.0
}

impl Fermentable {
    pub fn new(
        name: impl Into<String>,
        brand: impl Into<String>,
        category: impl Into<String>,
        potential: f64,
        color: f64,
    ) -> Self {
        let name = name.into();
        let brand = brand.into();
        let slug = slugify(&format!("{brand}_{name}"));
        Self {
            name,
            brand,
            slug,
            category: category.into(),
            potential,
            color,
            min_percent: 0.0,
            max_percent: 100.0,
            sensory: BTreeMap::new(),
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = slug.into();
        self
    }

    pub fn with_sensory(mut self, descriptor: impl Into<String>, intensity: f64) -> Self {
        self.sensory.insert(descriptor.into(), intensity);
        self
    }

    /// Request-scoped copy with different usage bounds. The original is untouched.
    pub fn with_usage(&self, min_percent: f64, max_percent: f64) -> Result<Self> {
        check_usage(&format!("usage of `{}`", self.slug), min_percent, max_percent)?;
        let mut copy = self.clone();
        copy.min_percent = min_percent;
        copy.max_percent = max_percent;
        Ok(copy)
    }

    /// Gravity points per pound per gallon.
    pub fn ppg(&self) -> f64 {
        gravity_points(self.potential)
    }

    pub fn intensity(&self, descriptor: &str) -> f64 {
        self.sensory.get(descriptor).copied().unwrap_or(0.0)
    }
}

/// A fermentable category with aggregate usage bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub min_percent: f64,
    #[serde(default = "default_max_percent")]
    pub max_percent: f64,
    /// Cap on distinct fermentables used from this category.
    #[serde(default, alias = "unique_fermentable_count")]
    pub max_unique: Option<u32>,
}

impl Category {
    pub fn new(name: impl Into<String>, min_percent: f64, max_percent: f64) -> Self {
        Self {
            name: name.into(),
            min_percent,
            max_percent,
            max_unique: None,
        }
    }

    pub fn with_max_unique(mut self, n: u32) -> Self {
        self.max_unique = Some(n);
        self
    }
}

pub(crate) fn check_usage(what: &str, min: f64, max: f64) -> Result<()> {
    check_range(what, min, max)?;
    if min < 0.0 || max > 100.0 {
        return Err(BrewError::bound(what, min, max));
    }
    Ok(())
}

/// How a hop addition is used; selects the utilization and flavor branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HopUsage {
    Boil,
    FirstWort,
    Aroma,
    Whirlpool,
    DryHop,
}

impl HopUsage {
    pub fn as_str(&self) -> &'static str {
        match self {
            HopUsage::Boil => "boil",
            HopUsage::FirstWort => "first_wort",
            HopUsage::Aroma => "aroma",
            HopUsage::Whirlpool => "whirlpool",
            HopUsage::DryHop => "dry_hop",
        }
    }

    /// Parses the usage labels found in recipe files ("Dry Hop", "first wort", ...).
    pub fn parse(s: &str) -> Option<HopUsage> {
        let norm: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        match norm.as_str() {
            "boil" => Some(HopUsage::Boil),
            "first_wort" => Some(HopUsage::FirstWort),
            "aroma" => Some(HopUsage::Aroma),
            "whirlpool" => Some(HopUsage::Whirlpool),
            "dry_hop" => Some(HopUsage::DryHop),
            _ => None,
        }
    }
}

impl fmt::Display for HopUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hop variety.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hop {
    pub name: String,
    #[serde(default)]
    pub slug: String,
    /// Alpha acids, percent.
    pub alpha: f64,
    #[serde(default)]
    pub beta: f64,
    #[serde(default)]
    pub cohumulone: f64,
    /// Essential oil content, mL/100g.
    #[serde(default)]
    pub total_oil: f64,
    /// Aroma descriptor -> intensity.
    #[serde(default)]
    pub aroma: BTreeMap<String, f64>,
}

impl Hop {
    pub fn new(name: impl Into<String>, alpha: f64, total_oil: f64) -> Self {
        let name = name.into();
        Self {
            slug: slugify(&name),
            name,
            alpha,
            beta: 0.0,
            cohumulone: 0.0,
            total_oil,
            aroma: BTreeMap::new(),
        }
    }

    pub fn with_aroma(mut self, descriptor: impl Into<String>, intensity: f64) -> Self {
        self.aroma.insert(descriptor.into(), intensity);
        self
    }

    pub fn intensity(&self, descriptor: &str) -> f64 {
        self.aroma.get(descriptor).copied().unwrap_or(0.0)
    }
}

/// In-memory ingredient catalog, populated by an external loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub fermentables: Vec<Fermentable>,
    #[serde(default)]
    pub hops: Vec<Hop>,
}

impl Catalog {
    /// Builds a catalog, deriving any missing slug from brand and name.
    pub fn new(mut fermentables: Vec<Fermentable>, mut hops: Vec<Hop>) -> Self {
        for f in fermentables.iter_mut().filter(|f| f.slug.is_empty()) {
            f.slug = slugify(&format!("{}_{}", f.brand, f.name));
        }
        for h in hops.iter_mut().filter(|h| h.slug.is_empty()) {
            h.slug = slugify(&h.name);
        }
        Self { fermentables, hops }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let raw: Catalog = serde_json::from_str(text)?;
        Ok(Catalog::new(raw.fermentables, raw.hops))
    }

    pub fn fermentable(&self, slug: &str) -> Result<&Fermentable> {
        self.fermentables
            .iter()
            .find(|f| f.slug == slug)
            .ok_or_else(|| BrewError::UnmatchedIngredient(slug.to_string()))
    }

    /// Clones the fermentables named by `slugs`, in request order.
    pub fn fermentables<S: AsRef<str>>(&self, slugs: &[S]) -> Result<Vec<Fermentable>> {
        slugs
            .iter()
            .map(|s| self.fermentable(s.as_ref()).cloned())
            .collect()
    }

    pub fn fermentables_in<S: AsRef<str>>(&self, categories: &[S]) -> Vec<&Fermentable> {
        self.fermentables
            .iter()
            .filter(|f| categories.iter().any(|c| c.as_ref() == f.category))
            .collect()
    }

    pub fn fermentable_slugs(&self) -> Vec<&str> {
        self.fermentables.iter().map(|f| f.slug.as_str()).collect()
    }

    /// Distinct categories, sorted.
    pub fn categories(&self) -> Vec<String> {
        self.fermentables
            .iter()
            .map(|f| f.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn sensory_keywords(&self) -> Vec<String> {
        sensory_keywords(&self.fermentables)
    }

    pub fn hop(&self, slug: &str) -> Result<&Hop> {
        self.hops
            .iter()
            .find(|h| h.slug == slug)
            .ok_or_else(|| BrewError::UnmatchedIngredient(slug.to_string()))
    }

    pub fn hops<S: AsRef<str>>(&self, slugs: &[S]) -> Result<Vec<Hop>> {
        slugs.iter().map(|s| self.hop(s.as_ref()).cloned()).collect()
    }

    pub fn hop_by_name(&self, name: &str) -> Option<&Hop> {
        self.hops.iter().find(|h| h.name == name)
    }

    pub fn hop_slugs(&self) -> Vec<&str> {
        self.hops.iter().map(|h| h.slug.as_str()).collect()
    }
}

/// Distinct sensory descriptors over a set of fermentables, sorted.
pub fn sensory_keywords(fermentables: &[Fermentable]) -> Vec<String> {
    fermentables
        .iter()
        .flat_map(|f| f.sensory.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct aroma descriptors over a set of hops, sorted.
pub fn aroma_keywords(hops: &[Hop]) -> Vec<String> {
    hops.iter()
        .flat_map(|h| h.aroma.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Lowercase ASCII slug; apostrophes and ® vanish, other runs become `-`.
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_dash = false;
    for c in s.chars() {
        if c == '\'' || c == '®' || c == '’' {
            continue;
        }
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::new(
            vec![
                Fermentable::new("2-Row", "Briess", "base", 1.037, 2.0)
                    .with_sensory("grainy", 1.5)
                    .with_sensory("sweet", 0.5),
                Fermentable::new("Caramel 40L", "Briess", "crystal", 1.034, 40.0)
                    .with_sensory("caramel", 3.0),
            ],
            vec![Hop::new("Amarillo®", 9.2, 1.5).with_aroma("grapefruit", 1.0)],
        )
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Briess_2-Row"), "briess-2-row");
        assert_eq!(slugify("Weyermann_Carafa® Special III"), "weyermann-carafa-special-iii");
        assert_eq!(slugify("Crisp_Maris Otter's"), "crisp-maris-otters");
        assert_eq!(slugify("Amarillo®"), "amarillo");
    }

    #[test]
    fn test_lookup_by_slug() {
        let c = catalog();
        assert_eq!(c.fermentable("briess-2-row").unwrap().category, "base");
        let list = c.fermentables(&["briess-caramel-40l", "briess-2-row"]).unwrap();
        assert_eq!(list[0].category, "crystal");
        assert!(matches!(
            c.fermentable("nope"),
            Err(BrewError::UnmatchedIngredient(s)) if s == "nope"
        ));
        assert!(c.hops(&["amarillo", "citra"]).is_err());
    }

    #[test]
    fn test_categories_and_keywords() {
        let c = catalog();
        assert_eq!(c.categories(), vec!["base", "crystal"]);
        assert_eq!(c.sensory_keywords(), vec!["caramel", "grainy", "sweet"]);
        assert_eq!(c.fermentables_in(&["crystal"]).len(), 1);
        assert_eq!(aroma_keywords(&c.hops), vec!["grapefruit"]);
    }

    #[test]
    fn test_with_usage_clones() {
        let c = catalog();
        let base = c.fermentable("briess-2-row").unwrap();
        let narrowed = base.with_usage(60.0, 90.0).unwrap();
        assert_eq!(narrowed.max_percent, 90.0);
        assert_eq!(c.fermentable("briess-2-row").unwrap().max_percent, 100.0);
        assert!(base.with_usage(50.0, 10.0).is_err());
        assert!(base.with_usage(0.0, 120.0).is_err());
    }

    #[test]
    fn test_hop_usage_parse() {
        assert_eq!(HopUsage::parse("Dry Hop"), Some(HopUsage::DryHop));
        assert_eq!(HopUsage::parse("first wort"), Some(HopUsage::FirstWort));
        assert_eq!(HopUsage::parse("mash"), None);
    }

    #[test]
    fn test_catalog_from_json() {
        let json = r#"{
            "fermentables": [
                {"name": "Pale Ale", "brand": "Crisp", "category": "base",
                 "potential": 1.038, "color": 3.0, "sensory_data": {"bready": 2.0}}
            ],
            "hops": [{"name": "Citra", "alpha": 12.0, "total_oil": 2.5}]
        }"#;
        let c = Catalog::from_json(json).unwrap();
        let f = c.fermentable("crisp-pale-ale").unwrap();
        assert_eq!(f.max_percent, 100.0);
        assert_eq!(f.intensity("bready"), 2.0);
        assert_eq!(f.intensity("roasted"), 0.0);
        assert!((f.ppg() - 38.0).abs() < 1e-9);
        assert_eq!(c.hop("citra").unwrap().alpha, 12.0);
    }
}
