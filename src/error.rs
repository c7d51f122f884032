use thiserror::Error;

/// Failures surfaced by engines, statistics and the driver.
///
/// Every variant is scoped to a single call; nothing here is fatal to the
/// process.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Expected heterozygosity is zero, so F has no defined value.
    #[error("F-statistic undefined: population fixed at p = {allele_frequency}")]
    DegenerateStatistic { allele_frequency: f64 },

    #[error("a step schedule is already running; pause it before starting another")]
    SchedulingConflict,
}

pub type Result<T> = std::result::Result<T, SimError>;

impl SimError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}

/// Reject probabilities outside [0, 1], NaN included.
pub(crate) fn check_probability(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SimError::invalid(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}
