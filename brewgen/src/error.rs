//! Error types
//!
//! Everything here is rejected before a model reaches the solver. A model the
//! solver cannot satisfy is not an error; see [`crate::orchestrator::Outcome`].

use thiserror::Error;

/// Errors raised while validating inputs or building a model.
#[derive(Debug, Error)]
pub enum BrewError {
    /// A fermentable belongs to a category missing from the category list
    #[error("fermentable `{fermentable}` uses category `{category}` which is not in the category profile")]
    UnknownCategory { fermentable: String, category: String },
    /// The same category name appears twice in a profile
    #[error("category `{0}` is listed more than once")]
    DuplicateCategory(String),
    /// A min/max pair is inverted or outside its allowed domain
    #[error("invalid bound for {what}: min {min} / max {max}")]
    InvalidBound { what: String, min: f64, max: f64 },
    /// Any other structural problem with a request
    #[error("invalid profile: {0}")]
    InvalidProfile(String),
    /// A value does not fit the integer range the solver accepts
    #[error("{what} = {value} overflows the scaled integer limit {limit}")]
    ScalingOverflow { what: String, value: f64, limit: i64 },
    /// A slug that is not in the catalog
    #[error("unmatched ingredient `{0}`")]
    UnmatchedIngredient(String),
    #[error("config: {0}")]
    Config(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BrewError>;

impl BrewError {
    pub(crate) fn bound(what: impl Into<String>, min: f64, max: f64) -> Self {
        BrewError::InvalidBound {
            what: what.into(),
            min,
            max,
        }
    }
}

/// Checks `min <= max` and that both are finite.
pub(crate) fn check_range(what: &str, min: f64, max: f64) -> Result<()> {
    if !min.is_finite() || !max.is_finite() || min > max {
        return Err(BrewError::bound(what, min, max));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range() {
        assert!(check_range("x", 0.0, 1.0).is_ok());
        assert!(check_range("x", 1.0, 1.0).is_ok());
        assert!(matches!(
            check_range("x", 2.0, 1.0),
            Err(BrewError::InvalidBound { .. })
        ));
        assert!(check_range("x", f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_error_messages() {
        let e = BrewError::UnknownCategory {
            fermentable: "briess-2-row".into(),
            category: "base".into(),
        };
        assert_eq!(
            e.to_string(),
            "fermentable `briess-2-row` uses category `base` which is not in the category profile"
        );
        assert_eq!(
            BrewError::UnmatchedIngredient("nope".into()).to_string(),
            "unmatched ingredient `nope`"
        );
    }
}
