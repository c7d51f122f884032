use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{EpidemicParams, RatesPatch, check_size};
use crate::driver::Engine;
use crate::error::Result;
use crate::grid::{Grid, neighbors8_wrap};
use crate::rng::RandomDraw;

/// SIR compartment. Transitions only run S -> I -> R; R is absorbing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthState {
    #[default]
    Susceptible,
    Infected,
    Recovered,
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealthState::Susceptible => "S",
            HealthState::Infected => "I",
            HealthState::Recovered => "R",
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EpidemicCounts {
    pub susceptible: usize,
    pub infected: usize,
    pub recovered: usize,
}

impl EpidemicCounts {
    pub fn tally(grid: &Grid<HealthState>) -> Self {
        let mut counts = Self::default();
        for &c in &grid.data {
            match c {
                HealthState::Susceptible => counts.susceptible += 1,
                HealthState::Infected => counts.infected += 1,
                HealthState::Recovered => counts.recovered += 1,
            }
        }
        counts
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EpidemicGrid {
    pub cells: Grid<HealthState>,
    pub generation: u64,
    pub counts: EpidemicCounts,
}

impl EpidemicGrid {
    /// All susceptible except one uniformly chosen infected cell.
    pub fn init<D: RandomDraw + ?Sized>(size: usize, draw: &mut D) -> Result<Self> {
        check_size(size)?;

        let mut cells = Grid::filled(size, HealthState::Susceptible);
        let last = size as i64 - 1;
        let row = draw.uniform_int(0, last) as usize;
        let col = draw.uniform_int(0, last) as usize;
        cells.set(row, col, HealthState::Infected);

        let counts = EpidemicCounts::tally(&cells);
        Ok(Self {
            cells,
            generation: 0,
            counts,
        })
    }

    /// Advance one tick.
    ///
    /// Infected cells expose each of their 8 neighbors; with `p_long_range`
    /// an exposure is redirected to a uniformly random cell. A target that
    /// is susceptible in `self` becomes infected with `p_infect`. Then the
    /// source recovers with `p_recover`. All reads come from `self`; all
    /// writes go to the new grid, and counts are retallied from scratch.
    pub fn step<D: RandomDraw + ?Sized>(&self, params: &EpidemicParams, draw: &mut D) -> Result<Self> {
        params.validate_rates()?;

        let old = &self.cells;
        let size = old.size;
        let last = size as i64 - 1;
        let mut cells = Grid::filled(size, HealthState::Susceptible);
        for (i, &c) in old.data.iter().enumerate() {
            if c == HealthState::Recovered {
                cells.data[i] = HealthState::Recovered;
            }
        }

        for row in 0..size {
            for col in 0..size {
                if old.get(row, col) != HealthState::Infected {
                    continue;
                }
                for (nr, nc) in neighbors8_wrap(row, col, size) {
                    let (tr, tc) = if draw.uniform() < params.p_long_range {
                        (
                            draw.uniform_int(0, last) as usize,
                            draw.uniform_int(0, last) as usize,
                        )
                    } else {
                        (nr, nc)
                    };
                    if old.get(tr, tc) == HealthState::Susceptible
                        && draw.uniform() < params.p_infect
                    {
                        cells.set(tr, tc, HealthState::Infected);
                    }
                }
                let next = if draw.uniform() < params.p_recover {
                    HealthState::Recovered
                } else {
                    HealthState::Infected
                };
                cells.set(row, col, next);
            }
        }

        let counts = EpidemicCounts::tally(&cells);
        let next = Self {
            cells,
            generation: self.generation + 1,
            counts,
        };
        debug!(
            generation = next.generation,
            susceptible = counts.susceptible,
            infected = counts.infected,
            recovered = counts.recovered,
            "epidemic step"
        );
        Ok(next)
    }

    pub fn infected(&self) -> usize {
        self.counts.infected
    }

    /// No infected cells remain, so no further step can change the grid.
    pub fn is_extinct(&self) -> bool {
        self.counts.infected == 0
    }
}

/// Driver-owned epidemic state.
pub struct EpidemicRun<D> {
    params: EpidemicParams,
    draw: D,
    grid: EpidemicGrid,
}

impl<D: RandomDraw> EpidemicRun<D> {
    pub fn new(params: EpidemicParams, mut draw: D) -> Result<Self> {
        params.validate()?;
        let grid = EpidemicGrid::init(params.size, &mut draw)?;
        Ok(Self { params, draw, grid })
    }

    pub fn grid(&self) -> &EpidemicGrid {
        &self.grid
    }

    pub fn params(&self) -> &EpidemicParams {
        &self.params
    }

    /// Swap per-step probabilities without touching the grid. Rates missing
    /// from `patch` keep their current value.
    pub fn set_rates(&mut self, patch: &RatesPatch) -> Result<()> {
        let updated = patch.merged(&self.params);
        updated.validate_rates()?;
        self.params = updated;
        Ok(())
    }

    pub fn restart(&mut self, params: EpidemicParams) -> Result<()> {
        params.validate()?;
        self.grid = EpidemicGrid::init(params.size, &mut self.draw)?;
        self.params = params;
        Ok(())
    }
}

impl<D: RandomDraw + Send + 'static> Engine for EpidemicRun<D> {
    type Snapshot = EpidemicGrid;

    fn snapshot(&self) -> EpidemicGrid {
        self.grid.clone()
    }

    fn advance(&mut self) -> Result<()> {
        self.grid = self.grid.step(&self.params, &mut self.draw)?;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.restart(self.params.clone())
    }

    fn is_finished(&self) -> bool {
        self.grid.is_extinct()
    }

    fn label(&self) -> &'static str {
        "epidemic"
    }
}
