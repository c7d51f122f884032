use std::fmt;

use serde::Serialize;

use crate::error::{Result, SimError};
use crate::genetics::Genotype;
use crate::grid::Grid;

/// Genotype tallies over a whole grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GenotypeCounts {
    pub a1a1: usize,
    pub a1a2: usize,
    pub a2a2: usize,
}

impl GenotypeCounts {
    pub fn tally(grid: &Grid<Genotype>) -> Self {
        let mut counts = Self::default();
        for &g in &grid.data {
            match g {
                Genotype::A1A1 => counts.a1a1 += 1,
                Genotype::A1A2 => counts.a1a2 += 1,
                Genotype::A2A2 => counts.a2a2 += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.a1a1 + self.a1a2 + self.a2a2
    }
}

/// Heterozygosity and fixation index for one population.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FStatistic {
    pub observed_heterozygosity: f64,
    pub expected_heterozygosity: f64,
    /// Frequency of allele A1.
    pub allele_frequency: f64,
    pub f: f64,
}

/// Wright's F from raw genotype counts.
///
/// Fails with `DegenerateStatistic` when the population is fixed for one
/// allele (H_e = 0) and with `InvalidParameter` on an empty population.
pub fn f_statistic(a1a1: usize, a1a2: usize, a2a2: usize) -> Result<FStatistic> {
    let n = a1a1 + a1a2 + a2a2;
    if n == 0 {
        return Err(SimError::invalid("cannot compute F for an empty population"));
    }
    let n = n as f64;
    let h_o = a1a2 as f64 / n;
    let p = (2 * a1a1 + a1a2) as f64 / (2.0 * n);
    let h_e = 2.0 * p * (1.0 - p);
    if h_e == 0.0 {
        return Err(SimError::DegenerateStatistic { allele_frequency: p });
    }
    Ok(FStatistic {
        observed_heterozygosity: h_o,
        expected_heterozygosity: h_e,
        allele_frequency: p,
        f: (h_e - h_o) / h_e,
    })
}

/// Snapshot-friendly bundle of the statistics above; `f` is `None` when
/// undefined rather than NaN.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PopulationSummary {
    pub counts: GenotypeCounts,
    pub allele_frequency: f64,
    pub observed_heterozygosity: f64,
    pub expected_heterozygosity: f64,
    pub f: Option<f64>,
}

impl PopulationSummary {
    pub fn from_counts(counts: GenotypeCounts) -> Self {
        match f_statistic(counts.a1a1, counts.a1a2, counts.a2a2) {
            Ok(s) => Self {
                counts,
                allele_frequency: s.allele_frequency,
                observed_heterozygosity: s.observed_heterozygosity,
                expected_heterozygosity: s.expected_heterozygosity,
                f: Some(s.f),
            },
            Err(_) => {
                let n = counts.total().max(1) as f64;
                Self {
                    counts,
                    allele_frequency: (2 * counts.a1a1 + counts.a1a2) as f64 / (2.0 * n),
                    observed_heterozygosity: counts.a1a2 as f64 / n,
                    expected_heterozygosity: 0.0,
                    f: None,
                }
            }
        }
    }

    /// `F` for display, "N/A" when undefined.
    pub fn f_display(&self) -> FDisplay {
        FDisplay(self.f)
    }
}

pub struct FDisplay(Option<f64>);

impl fmt::Display for FDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{v:.4}"),
            None => f.write_str("N/A"),
        }
    }
}
