use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError, check_probability};

/// Well-mixed drift run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftParams {
    pub population_size: usize,
    pub generations: usize,
    /// Independent trajectories to run side by side.
    pub replicates: usize,
}

impl Default for DriftParams {
    fn default() -> Self {
        Self {
            population_size: 100,
            generations: 100,
            replicates: 1,
        }
    }
}

impl DriftParams {
    pub fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(SimError::invalid("population_size must be positive"));
        }
        if self.replicates == 0 {
            return Err(SimError::invalid("replicates must be positive"));
        }
        Ok(())
    }
}

/// Spatial migration grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationParams {
    pub size: usize,
    /// Initial frequency of allele A1.
    pub allele_frequency: f64,
    /// Max row/col offset when picking a mate.
    pub mating_distance: u32,
}

impl Default for MigrationParams {
    fn default() -> Self {
        Self {
            size: 75,
            allele_frequency: 0.5,
            mating_distance: 1,
        }
    }
}

impl MigrationParams {
    pub fn validate(&self) -> Result<()> {
        check_size(self.size)?;
        check_probability("allele_frequency", self.allele_frequency)?;
        check_mating_distance(self.mating_distance)
    }
}

/// Spatial SIR grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpidemicParams {
    pub size: usize,
    pub p_infect: f64,
    pub p_recover: f64,
    /// Chance that an exposure targets a random cell instead of the neighbor.
    pub p_long_range: f64,
}

impl Default for EpidemicParams {
    fn default() -> Self {
        Self {
            size: 75,
            p_infect: 0.2,
            p_recover: 0.1,
            p_long_range: 0.001,
        }
    }
}

impl EpidemicParams {
    pub fn validate(&self) -> Result<()> {
        check_size(self.size)?;
        self.validate_rates()
    }

    /// Per-step probabilities only; `size` is fixed once a grid exists.
    pub fn validate_rates(&self) -> Result<()> {
        check_probability("p_infect", self.p_infect)?;
        check_probability("p_recover", self.p_recover)?;
        check_probability("p_long_range", self.p_long_range)
    }
}

/// Mid-run change to the epidemic rates. Fields left out keep their
/// current value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatesPatch {
    pub p_infect: Option<f64>,
    pub p_recover: Option<f64>,
    pub p_long_range: Option<f64>,
}

impl RatesPatch {
    /// `params` with every present field overridden. Not validated.
    pub fn merged(&self, params: &EpidemicParams) -> EpidemicParams {
        EpidemicParams {
            p_infect: self.p_infect.unwrap_or(params.p_infect),
            p_recover: self.p_recover.unwrap_or(params.p_recover),
            p_long_range: self.p_long_range.unwrap_or(params.p_long_range),
            ..params.clone()
        }
    }
}

/// Mid-run change to the mating radius; absent means unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatingPatch {
    pub mating_distance: Option<u32>,
}

/// Scheduler cadence for timer-driven runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverParams {
    pub interval_ms: u64,
}

impl Default for DriverParams {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

impl DriverParams {
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(SimError::invalid("interval_ms must be positive"));
        }
        Ok(())
    }
}

pub(crate) fn check_size(size: usize) -> Result<()> {
    if size == 0 {
        return Err(SimError::invalid("grid size must be positive"));
    }
    Ok(())
}

pub(crate) fn check_mating_distance(d: u32) -> Result<()> {
    if d == 0 {
        return Err(SimError::invalid("mating_distance must be at least 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(DriftParams::default().validate().is_ok());
        assert!(MigrationParams::default().validate().is_ok());
        assert!(EpidemicParams::default().validate().is_ok());
        assert!(DriverParams::default().validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let p: EpidemicParams = serde_json::from_str(r#"{"p_infect": 0.5}"#).unwrap();
        assert_eq!(p.p_infect, 0.5);
        assert_eq!(p.size, 75);
        assert_eq!(p.p_recover, EpidemicParams::default().p_recover);
    }

    #[test]
    fn rates_patch_only_touches_present_fields() {
        let current = EpidemicParams {
            size: 10,
            p_infect: 0.9,
            p_recover: 0.5,
            p_long_range: 0.3,
        };
        let patch: RatesPatch = serde_json::from_str(r#"{"p_recover": 0.05}"#).unwrap();
        assert_eq!(patch.p_infect, None);
        let merged = patch.merged(&current);
        assert_eq!(merged.p_recover, 0.05);
        assert_eq!(merged.p_infect, 0.9);
        assert_eq!(merged.p_long_range, 0.3);
        assert_eq!(merged.size, 10);

        let empty: MatingPatch = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.mating_distance, None);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let bad = MigrationParams {
            mating_distance: 0,
            ..MigrationParams::default()
        };
        assert!(matches!(bad.validate(), Err(SimError::InvalidParameter(_))));

        let bad = EpidemicParams {
            p_long_range: 1.5,
            ..EpidemicParams::default()
        };
        assert!(bad.validate().is_err());

        let bad = DriftParams {
            population_size: 0,
            ..DriftParams::default()
        };
        assert!(bad.validate().is_err());
    }
}
