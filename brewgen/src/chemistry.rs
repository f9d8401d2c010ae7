//! Brewing chemistry.
//!
//! Gravity, color, bitterness and hop flavor formulas. All pure functions over
//! `f64`; the formulation layer scales some of them into integer coefficients.
//!
//! Units: the grain side works in US gallons and pounds (extract potential is
//! expressed in gravity points per pound per gallon); the hop side works in
//! grams and liters.

use crate::ingredients::HopUsage;

/// Morey equation coefficient.
pub const MOREY_COEFFICIENT: f64 = 1.4922;
/// Morey equation exponent.
pub const MOREY_EXPONENT: f64 = 0.6859;

pub const LITERS_PER_GALLON: f64 = 3.785_411_784;

/// Tinseth boil-time decay rate (per minute).
pub const BOIL_DECAY: f64 = 0.04;
/// Tinseth maximum utilization divisor.
pub const BOIL_DIVISOR: f64 = 4.15;
/// First wort hops get a fixed bonus over a plain boil addition of the same duration.
pub const FIRST_WORT_MULTIPLIER: f64 = 1.1;
/// Time factor used for whirlpool/aroma additions regardless of their stand time.
pub const WHIRLPOOL_TIME_FACTOR: f64 = 0.04;

/// Quadratic decay rate of volatile hop oils during the boil (per minute squared).
pub const FLAVOR_DECAY: f64 = 0.002;
/// Flavor factor of aroma/whirlpool additions.
pub const WHIRLPOOL_FLAVOR_FACTOR: f64 = 1.0;
/// Flavor factor of dry hop additions.
pub const DRY_HOP_FLAVOR_FACTOR: f64 = 1.25;

/// Gravity points of a specific gravity: `1.050` -> `50`.
pub fn gravity_points(sg: f64) -> f64 {
    (sg - 1.0) * 1000.0
}

/// Total gravity points a batch needs: points per gallon times volume.
pub fn points_needed(original_sg: f64, volume_gallons: f64) -> f64 {
    gravity_points(original_sg) * volume_gallons
}

/// Weight (lb) of every fermentable of a bill.
///
/// `entries` holds `(ppg, usage_percent)` pairs. The average extract is
/// weighted by usage, then the total grain weight is split by usage fraction.
/// A bill with no extract at all yields zero weights.
pub fn grain_weights(
    original_sg: f64,
    volume_gallons: f64,
    mash_efficiency: f64,
    entries: &[(f64, f64)],
) -> Vec<f64> {
    let needed = points_needed(original_sg, volume_gallons);
    let average_ppg: f64 = entries.iter().map(|(ppg, pct)| ppg * pct / 100.0).sum();
    let denom = average_ppg * mash_efficiency;
    if denom <= 0.0 {
        return vec![0.0; entries.len()];
    }
    entries
        .iter()
        .map(|(_, pct)| needed / denom * (pct / 100.0))
        .collect()
}

/// Malt color units: `sum(color * weight) / volume`.
///
/// `entries` holds `(color_lovibond, weight_lb)` pairs.
pub fn mash_color_units(entries: &[(f64, f64)], volume_gallons: f64) -> f64 {
    if volume_gallons <= 0.0 {
        return 0.0;
    }
    entries.iter().map(|(c, w)| c * w / volume_gallons).sum()
}

/// Morey equation: MCU -> SRM.
pub fn morey_srm(mcu: f64) -> f64 {
    if mcu <= 0.0 {
        return 0.0;
    }
    MOREY_COEFFICIENT * mcu.powf(MOREY_EXPONENT)
}

/// Tinseth bigness factor of the wort gravity.
pub fn bigness_factor(original_sg: f64) -> f64 {
    1.65 * 0.000125_f64.powf(original_sg - 1.0)
}

/// Tinseth boil-time factor.
pub fn boil_time_factor(minutes: f64) -> f64 {
    (1.0 - (-BOIL_DECAY * minutes).exp()) / BOIL_DIVISOR
}

/// Fraction of alpha acids isomerized by an addition.
pub fn utilization(usage: HopUsage, minutes: f64, original_sg: f64) -> f64 {
    let time_factor = match usage {
        HopUsage::Boil => boil_time_factor(minutes),
        HopUsage::FirstWort => FIRST_WORT_MULTIPLIER * boil_time_factor(minutes),
        HopUsage::Aroma | HopUsage::Whirlpool => WHIRLPOOL_TIME_FACTOR,
        HopUsage::DryHop => 0.0,
    };
    bigness_factor(original_sg) * time_factor
}

/// IBU per gram of hop for one addition (alpha in percent).
pub fn ibu_per_gram(
    usage: HopUsage,
    minutes: f64,
    alpha_percent: f64,
    original_sg: f64,
    volume_liters: f64,
) -> f64 {
    if volume_liters <= 0.0 {
        return 0.0;
    }
    utilization(usage, minutes, original_sg) * (alpha_percent / 100.0) * 1000.0 / volume_liters
}

/// IBU of one addition: mg/L of isomerized alpha acids.
pub fn ibu(
    usage: HopUsage,
    minutes: f64,
    alpha_percent: f64,
    grams: f64,
    original_sg: f64,
    volume_liters: f64,
) -> f64 {
    ibu_per_gram(usage, minutes, alpha_percent, original_sg, volume_liters) * grams
}

/// Share of hop oil aroma that survives an addition.
pub fn flavor_time_factor(usage: HopUsage, minutes: f64) -> f64 {
    match usage {
        HopUsage::Boil | HopUsage::FirstWort => (-FLAVOR_DECAY * minutes * minutes).exp(),
        HopUsage::Aroma | HopUsage::Whirlpool => WHIRLPOOL_FLAVOR_FACTOR,
        HopUsage::DryHop => DRY_HOP_FLAVOR_FACTOR,
    }
}

/// Flavor intensity per gram of hop for one descriptor.
///
/// `total_oil` is the hop's essential oil content (mL/100g), `intensity` the
/// descriptor intensity on the hop.
pub fn flavor_per_gram(
    usage: HopUsage,
    minutes: f64,
    total_oil: f64,
    intensity: f64,
    volume_liters: f64,
) -> f64 {
    if volume_liters <= 0.0 {
        return 0.0;
    }
    flavor_time_factor(usage, minutes) * total_oil * intensity / volume_liters
}

/// Flavor intensity of one addition for one descriptor.
pub fn flavor(
    usage: HopUsage,
    minutes: f64,
    total_oil: f64,
    intensity: f64,
    grams: f64,
    volume_liters: f64,
) -> f64 {
    flavor_per_gram(usage, minutes, total_oil, intensity, volume_liters) * grams
}
