//! Solved bills and what they turn into: weights, color, bitterness, flavor.

use crate::chemistry;
use crate::error::{BrewError, Result};
use crate::ingredients::{sensory_keywords, Fermentable, Hop, HopUsage};
use crate::profile::{BeerProfile, EquipmentProfile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fermentables with their usage percentages.
///
/// Owns a snapshot of the (possibly usage-overridden) fermentables it was
/// solved from, so it stays valid whatever happens to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrainBill {
    fermentables: Vec<Fermentable>,
    percents: Vec<f64>,
}

/// One line of a [`Recipe`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeGrain {
    pub slug: String,
    pub use_percent: f64,
    pub use_pounds: f64,
}

/// A grain bill made concrete for one beer and one brewhouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub grains: Vec<RecipeGrain>,
    pub srm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorCount {
    pub srm: i64,
    pub count: usize,
}

impl GrainBill {
    pub fn new(fermentables: Vec<Fermentable>, percents: Vec<f64>) -> Result<Self> {
        if fermentables.len() != percents.len() {
            return Err(BrewError::InvalidProfile(format!(
                "grain bill has {} fermentables but {} percentages",
                fermentables.len(),
                percents.len()
            )));
        }
        if let Some(p) = percents.iter().find(|p| !(p.is_finite() && **p >= 0.0)) {
            return Err(BrewError::InvalidProfile(format!("grain bill percentage {p} is not a non-negative number")));
        }
        Ok(Self {
            fermentables,
            percents,
        })
    }

    /// All entries, zero-percent ones included.
    pub fn entries(&self) -> impl Iterator<Item = (&Fermentable, f64)> {
        self.fermentables.iter().zip(self.percents.iter().copied())
    }

    /// Entries actually used.
    pub fn used(&self) -> impl Iterator<Item = (&Fermentable, f64)> {
        self.entries().filter(|(_, p)| *p > 0.0)
    }

    pub fn percent_of(&self, slug: &str) -> Option<f64> {
        self.entries().find(|(f, _)| f.slug == slug).map(|(_, p)| p)
    }

    pub fn total_percent(&self) -> f64 {
        self.percents.iter().sum()
    }

    pub fn unique_count(&self) -> usize {
        self.used().count()
    }

    /// Sum of percentages of the fermentables in `category`.
    pub fn category_percent(&self, category: &str) -> f64 {
        self.entries()
            .filter(|(f, _)| f.category == category)
            .map(|(_, p)| p)
            .sum()
    }

    /// Pounds of each fermentable, in bill order.
    pub fn weights(&self, beer: &BeerProfile, equipment: &EquipmentProfile) -> Vec<f64> {
        let entries: Vec<(f64, f64)> = self.entries().map(|(f, p)| (f.ppg(), p)).collect();
        chemistry::grain_weights(
            beer.original_sg,
            equipment.target_volume_gallons,
            equipment.mash_efficiency,
            &entries,
        )
    }

    pub fn srm(&self, beer: &BeerProfile, equipment: &EquipmentProfile) -> f64 {
        let weights = self.weights(beer, equipment);
        let entries: Vec<(f64, f64)> = self
            .fermentables
            .iter()
            .zip(weights)
            .map(|(f, w)| (f.color, w))
            .collect();
        chemistry::morey_srm(chemistry::mash_color_units(
            &entries,
            equipment.target_volume_gallons,
        ))
    }

    pub fn recipe(&self, beer: &BeerProfile, equipment: &EquipmentProfile) -> Recipe {
        let weights = self.weights(beer, equipment);
        let grains = self
            .entries()
            .zip(weights)
            .filter(|((_, p), _)| *p > 0.0)
            .map(|((f, p), w)| RecipeGrain {
                slug: f.slug.clone(),
                use_percent: p,
                use_pounds: w,
            })
            .collect();
        Recipe {
            grains,
            srm: self.srm(beer, equipment),
        }
    }

    /// `sum(intensity * percent / 100)` for every keyword given, zero included.
    pub fn sensory_profile_over(&self, keywords: &[String]) -> BTreeMap<String, f64> {
        keywords
            .iter()
            .map(|k| {
                let v = self.entries().map(|(f, p)| f.intensity(k) * p / 100.0).sum();
                (k.clone(), v)
            })
            .collect()
    }

    /// Weighted sensory profile over every keyword the bill's fermentables carry.
    pub fn sensory_profile(&self) -> BTreeMap<String, f64> {
        self.sensory_profile_over(&sensory_keywords(&self.fermentables))
    }
}

/// Number of recipes per whole SRM (truncated), for every SRM from the
/// lowest to the highest seen. Empty input gives an empty histogram.
pub fn color_distribution(recipes: &[Recipe]) -> Vec<ColorCount> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for r in recipes {
        *counts.entry(r.srm.trunc() as i64).or_default() += 1;
    }
    let (Some(lo), Some(hi)) = (counts.keys().next().copied(), counts.keys().last().copied()) else {
        return Vec::new();
    };
    (lo..=hi)
        .map(|srm| ColorCount {
            srm,
            count: counts.get(&srm).copied().unwrap_or(0),
        })
        .collect()
}

/// A discrete hop addition time slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingBucket {
    pub name: String,
    pub usage: HopUsage,
    /// Boil minutes for boil buckets, ignored otherwise.
    #[serde(default)]
    pub minutes: f64,
}

/// Boil buckets and the upper edge of the addition times they collect.
const BOIL_BUCKETS: [(f64, f64); 6] = [
    (5.0, 7.5),
    (10.0, 12.5),
    (15.0, 22.5),
    (30.0, 37.5),
    (45.0, 52.5),
    (60.0, f64::INFINITY),
];

/// Boil additions shorter than this land in the whirlpool bucket.
const WHIRLPOOL_CUTOFF: f64 = 2.5;

impl TimingBucket {
    pub fn new(name: impl Into<String>, usage: HopUsage, minutes: f64) -> Self {
        Self {
            name: name.into(),
            usage,
            minutes,
        }
    }

    pub fn boil(minutes: f64) -> Self {
        Self::new(format!("{minutes}-minutes"), HopUsage::Boil, minutes)
    }

    pub fn whirlpool() -> Self {
        Self::new("whirlpool", HopUsage::Whirlpool, 0.0)
    }

    pub fn dry_hop() -> Self {
        Self::new("dry-hop", HopUsage::DryHop, 0.0)
    }

    /// 60, 45, 30, 15, 10 and 5 minute boil, whirlpool, dry hop.
    pub fn standard() -> Vec<TimingBucket> {
        let mut all: Vec<_> = BOIL_BUCKETS.iter().rev().map(|(m, _)| Self::boil(*m)).collect();
        all.push(Self::whirlpool());
        all.push(Self::dry_hop());
        all
    }

    /// Bucket an arbitrary addition belongs to.
    pub fn classify(usage: HopUsage, minutes: f64) -> TimingBucket {
        match usage {
            HopUsage::DryHop => Self::dry_hop(),
            HopUsage::Aroma | HopUsage::Whirlpool => Self::whirlpool(),
            HopUsage::Boil | HopUsage::FirstWort if minutes < WHIRLPOOL_CUTOFF => Self::whirlpool(),
            HopUsage::Boil | HopUsage::FirstWort => {
                let m = BOIL_BUCKETS
                    .iter()
                    .find(|(_, edge)| minutes < *edge)
                    .map_or(60.0, |(m, _)| *m);
                Self::boil(m)
            }
        }
    }

    /// IBU per gram of a hop added in this bucket.
    pub fn ibu_per_gram(&self, hop: &Hop, original_sg: f64, volume_liters: f64) -> f64 {
        chemistry::ibu_per_gram(self.usage, self.minutes, hop.alpha, original_sg, volume_liters)
    }

    /// Flavor per gram of a hop added in this bucket, for one descriptor.
    pub fn flavor_per_gram(&self, hop: &Hop, descriptor: &str, volume_liters: f64) -> f64 {
        chemistry::flavor_per_gram(
            self.usage,
            self.minutes,
            hop.total_oil,
            hop.intensity(descriptor),
            volume_liters,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopAddition {
    pub hop: Hop,
    pub minutes: f64,
    pub usage: HopUsage,
    pub grams: f64,
}

impl HopAddition {
    pub fn new(hop: Hop, minutes: f64, usage: HopUsage, grams: f64) -> Self {
        Self {
            hop,
            minutes,
            usage,
            grams,
        }
    }

    pub fn ibu(&self, original_sg: f64, volume_liters: f64) -> f64 {
        chemistry::ibu(
            self.usage,
            self.minutes,
            self.hop.alpha,
            self.grams,
            original_sg,
            volume_liters,
        )
    }

    pub fn flavor(&self, descriptor: &str, volume_liters: f64) -> f64 {
        chemistry::flavor(
            self.usage,
            self.minutes,
            self.hop.total_oil,
            self.hop.intensity(descriptor),
            self.grams,
            volume_liters,
        )
    }

    pub fn bucket(&self) -> TimingBucket {
        TimingBucket::classify(self.usage, self.minutes)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HopBill {
    pub additions: Vec<HopAddition>,
}

impl HopBill {
    pub fn new(additions: Vec<HopAddition>) -> Self {
        Self { additions }
    }

    pub fn ibu(&self, original_sg: f64, volume_liters: f64) -> f64 {
        self.additions
            .iter()
            .map(|a| a.ibu(original_sg, volume_liters))
            .sum()
    }

    /// Total grams.
    pub fn amount(&self) -> f64 {
        self.additions.iter().map(|a| a.grams).sum()
    }

    /// Distinct hop slugs with a positive amount, sorted.
    pub fn unique_hops(&self) -> Vec<&str> {
        let mut slugs: Vec<&str> = self
            .additions
            .iter()
            .filter(|a| a.grams > 0.0)
            .map(|a| a.hop.slug.as_str())
            .collect();
        slugs.sort_unstable();
        slugs.dedup();
        slugs
    }

    /// Flavor per descriptor, over every descriptor any hop of the bill carries.
    pub fn flavor(&self, volume_liters: f64) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        for a in &self.additions {
            for k in a.hop.aroma.keys() {
                *out.entry(k.clone()).or_insert(0.0) += a.flavor(k, volume_liters);
            }
        }
        out
    }

    /// Splits the bill into timing buckets, keeping first-seen bucket order.
    pub fn by_bucket(&self) -> Vec<(TimingBucket, HopBill)> {
        let mut out: Vec<(TimingBucket, HopBill)> = Vec::new();
        for a in &self.additions {
            let b = a.bucket();
            match out.iter_mut().find(|(k, _)| k.name == b.name) {
                Some((_, bill)) => bill.additions.push(a.clone()),
                None => out.push((b, HopBill::new(vec![a.clone()]))),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn bill() -> GrainBill {
        GrainBill::new(
            vec![
                Fermentable::new("2-Row", "Briess", "base", 1.037, 2.0).with_sensory("grainy", 2.0),
                Fermentable::new("Caramel 40L", "Briess", "crystal", 1.034, 40.0)
                    .with_sensory("caramel", 4.0)
                    .with_sensory("grainy", 1.0),
                Fermentable::new("Black", "Briess", "roast", 1.025, 500.0),
            ],
            vec![80.0, 20.0, 0.0],
        )
        .unwrap()
    }

    #[test]
    fn test_bill_shape_checks() {
        let f = Fermentable::new("2-Row", "Briess", "base", 1.037, 2.0);
        assert!(GrainBill::new(vec![f.clone()], vec![]).is_err());
        assert!(GrainBill::new(vec![f], vec![-1.0]).is_err());
    }

    #[test]
    fn test_totals() {
        let b = bill();
        assert!(close(b.total_percent(), 100.0));
        assert_eq!(b.unique_count(), 2);
        assert!(close(b.category_percent("crystal"), 20.0));
        assert_eq!(b.percent_of("briess-black"), Some(0.0));
    }

    #[test]
    fn test_recipe_omits_unused() {
        let beer = BeerProfile::new(1.050, 3.0, 10.0).unwrap();
        let eq = EquipmentProfile::new(75.0, 5.5).unwrap();
        let b = bill();
        let r = b.recipe(&beer, &eq);
        assert_eq!(r.grains.len(), 2);
        assert_eq!(r.grains[0].slug, "briess-2-row");

        let avg = 37.0 * 0.8 + 34.0 * 0.2;
        let total = 50.0 * 5.5 / (avg * 0.75);
        assert!(close(r.grains[0].use_pounds, total * 0.8));
        let mcu = (2.0 * total * 0.8 + 40.0 * total * 0.2) / 5.5;
        assert!(close(r.srm, 1.4922 * mcu.powf(0.6859)));
    }

    #[test]
    fn test_sensory_profile_reports_every_keyword() {
        let b = bill();
        let p = b.sensory_profile();
        assert!(close(p["grainy"], 2.0 * 0.8 + 1.0 * 0.2));
        assert!(close(p["caramel"], 0.8));
        let wide = b.sensory_profile_over(&["roasted".to_string()]);
        assert_eq!(wide["roasted"], 0.0);
    }

    #[test]
    fn test_color_distribution_fills_gaps() {
        let r = |srm| Recipe { grains: vec![], srm };
        let hist = color_distribution(&[r(4.2), r(6.6), r(3.9), r(7.0)]);
        assert_eq!(
            hist,
            vec![
                ColorCount { srm: 3, count: 1 },
                ColorCount { srm: 4, count: 1 },
                ColorCount { srm: 5, count: 0 },
                ColorCount { srm: 6, count: 1 },
                ColorCount { srm: 7, count: 1 },
            ]
        );
        assert!(color_distribution(&[]).is_empty());
    }

    #[test]
    fn test_classify_buckets() {
        let name = |u, m| TimingBucket::classify(u, m).name;
        assert_eq!(name(HopUsage::DryHop, 4320.0), "dry-hop");
        assert_eq!(name(HopUsage::Aroma, 20.0), "whirlpool");
        assert_eq!(name(HopUsage::Boil, 2.0), "whirlpool");
        assert_eq!(name(HopUsage::Boil, 7.0), "5-minutes");
        assert_eq!(name(HopUsage::Boil, 12.5), "15-minutes");
        assert_eq!(name(HopUsage::Boil, 37.0), "30-minutes");
        assert_eq!(name(HopUsage::FirstWort, 90.0), "60-minutes");
        assert_eq!(TimingBucket::standard().len(), 8);
        assert_eq!(TimingBucket::standard()[0].name, "60-minutes");
    }

    #[test]
    fn test_hop_bill_totals() {
        let citra = Hop::new("Citra", 12.0, 2.5).with_aroma("citrus", 4.0);
        let magnum = Hop::new("Magnum", 14.0, 2.0);
        let bill = HopBill::new(vec![
            HopAddition::new(magnum, 60.0, HopUsage::Boil, 20.0),
            HopAddition::new(citra.clone(), 5.0, HopUsage::Boil, 30.0),
            HopAddition::new(citra, 0.0, HopUsage::DryHop, 50.0),
        ]);
        assert!(close(bill.amount(), 100.0));
        assert_eq!(bill.unique_hops(), vec!["citra", "magnum"]);
        let ibu = bill.ibu(1.050, 20.0);
        let sum: f64 = bill.additions.iter().map(|a| a.ibu(1.050, 20.0)).sum();
        assert!(close(ibu, sum));
        assert!(ibu > 0.0);
        let flavor = bill.flavor(20.0);
        let expected = chemistry::flavor(HopUsage::Boil, 5.0, 2.5, 4.0, 30.0, 20.0)
            + chemistry::flavor(HopUsage::DryHop, 0.0, 2.5, 4.0, 50.0, 20.0);
        assert!(close(flavor["citrus"], expected));
        let split = bill.by_bucket();
        assert_eq!(split.len(), 3);
        assert_eq!(split[2].0.name, "dry-hop");
    }
}
