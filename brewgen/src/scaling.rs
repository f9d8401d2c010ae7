//! Fixed-point scaling of real-valued quantities into solver integers.
//!
//! Each purpose gets its own factor and an upper limit on the scaled
//! magnitude. Values past the limit are rejected here, before any model is
//! built.

use crate::error::{BrewError, Result};
use tracing::warn;

/// Largest magnitude any scaled value or linear sum may reach.
pub const SOLVER_LIMIT: i64 = i32::MAX as i64;

/// A fixed-point scale factor with its admissible magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scale {
    pub what: &'static str,
    pub factor: i64,
    /// Largest accepted |scaled value|.
    pub limit: i64,
}

/// Usage percentages are whole numbers in 0..=100.
pub const PERCENT: Scale = Scale {
    what: "percent",
    factor: 1,
    limit: 100,
};

/// Sensory intensities, up to 1000 per ingredient.
pub const SENSORY: Scale = Scale {
    what: "sensory intensity",
    factor: 10_000,
    limit: 1_000 * 10_000,
};

/// Color in degrees Lovibond.
pub const COLOR: Scale = Scale {
    what: "color",
    factor: 10,
    limit: 1_000 * 10,
};

/// Extract potential in gravity points per pound per gallon.
pub const GRAVITY: Scale = Scale {
    what: "gravity points",
    factor: 10,
    limit: 1_000 * 10,
};

/// IBU, also used for IBU-per-gram coefficients.
pub const IBU: Scale = Scale {
    what: "ibu",
    factor: 100,
    limit: 10_000 * 100,
};

/// Hop flavor intensity, also used for flavor-per-gram coefficients.
pub const FLAVOR: Scale = Scale {
    what: "flavor",
    factor: 1_000,
    limit: 100_000 * 1_000,
};

/// Hop mass in whole grams.
pub const MASS: Scale = Scale {
    what: "hop mass",
    factor: 1,
    limit: 100_000,
};

impl Scale {
    /// Rounds `value * factor` to the nearest integer.
    pub fn encode(&self, value: f64) -> Result<i64> {
        let scaled = (value * self.factor as f64).round();
        if !scaled.is_finite() || scaled.abs() > self.limit as f64 {
            return Err(BrewError::ScalingOverflow {
                what: self.what.to_string(),
                value,
                limit: self.limit,
            });
        }
        Ok(scaled as i64)
    }

    pub fn decode(&self, raw: i64) -> f64 {
        raw as f64 / self.factor as f64
    }

    /// Smallest representable step.
    pub fn resolution(&self) -> f64 {
        1.0 / self.factor as f64
    }
}

/// Largest drift, in decoded units, that rounding per-gram coefficients may
/// add to a total.
pub const MAX_DRIFT: f64 = 0.01;

/// Finer copy of `base` for totals built from per-gram coefficients.
///
/// Every rounded coefficient is off by at most half a step, so a total over
/// `mass` grams drifts by up to `mass / (2 * factor)`. The factor grows by
/// tens until that drift is under [`MAX_DRIFT`], as long as `worst` (the
/// largest decoded total the model can form) still fits the solver.
pub fn refine(base: Scale, mass: f64, worst: f64) -> Scale {
    let mut factor = base.factor;
    while mass / (2.0 * factor as f64) > MAX_DRIFT {
        let next = factor.saturating_mul(10);
        if worst * next as f64 > SOLVER_LIMIT as f64 {
            warn!(
                what = base.what,
                factor,
                drift = mass / (2.0 * factor as f64),
                "per-gram rounding drift stays above the target"
            );
            break;
        }
        factor = next;
    }
    let limit = (i128::from(base.limit) * i128::from(factor / base.factor)).min(i128::from(SOLVER_LIMIT));
    Scale {
        what: base.what,
        factor,
        limit: limit as i64,
    }
}

/// Rejects a linear sum whose worst-case magnitude would not fit the solver.
///
/// `max_abs` is the largest absolute value the sum can take given variable
/// bounds, computed by the caller in `i128`.
pub fn ensure_fits(what: &str, max_abs: i128) -> Result<()> {
    if max_abs > SOLVER_LIMIT as i128 {
        return Err(BrewError::ScalingOverflow {
            what: what.to_string(),
            value: max_abs as f64,
            limit: SOLVER_LIMIT,
        });
    }
    Ok(())
}
