use tracing::debug;

use crate::config::{MatingPatch, MigrationParams, check_mating_distance, check_size};
use crate::driver::Engine;
use crate::error::{Result, check_probability};
use crate::genetics::{Genotype, offspring};
use crate::grid::Grid;
use crate::rng::RandomDraw;
use crate::stats::{GenotypeCounts, PopulationSummary};

/// One generation of the spatial mating model.
#[derive(Clone, Debug, PartialEq)]
pub struct MigrationGrid {
    pub cells: Grid<Genotype>,
    pub generation: u64,
    pub counts: GenotypeCounts,
}

impl MigrationGrid {
    /// Seed each cell from Hardy-Weinberg proportions for frequency `p`.
    ///
    /// One uniform `r` per cell: `r < p^2` is A1A1, `r > 1 - (1-p)^2` is A2A2,
    /// everything between is A1A2.
    pub fn init<D: RandomDraw + ?Sized>(size: usize, p: f64, draw: &mut D) -> Result<Self> {
        check_size(size)?;
        check_probability("allele_frequency", p)?;

        let hom_a1 = p * p;
        let hom_a2 = 1.0 - (1.0 - p) * (1.0 - p);
        let cells = Grid::from_fn(size, |_, _| {
            let r = draw.uniform();
            if r < hom_a1 {
                Genotype::A1A1
            } else if r > hom_a2 {
                Genotype::A2A2
            } else {
                Genotype::A1A2
            }
        });
        let counts = GenotypeCounts::tally(&cells);
        Ok(Self {
            cells,
            generation: 0,
            counts,
        })
    }

    /// Produce the next generation. Every cell mates with a partner picked
    /// within `mating_distance` rows and columns (wrapping, self included);
    /// partners are always read from `self`, never from the grid being built.
    pub fn step<D: RandomDraw + ?Sized>(&self, mating_distance: u32, draw: &mut D) -> Result<Self> {
        check_mating_distance(mating_distance)?;

        let d = mating_distance as i64;
        let old = &self.cells;
        let cells = Grid::from_fn(old.size, |row, col| {
            let (i, j) = (row as i64, col as i64);
            let mate_row = draw.uniform_int(i - d, i + d);
            let mate_col = draw.uniform_int(j - d, j + d);
            let mate = old.get_wrapped(mate_row, mate_col);
            offspring(old.get(row, col), mate, &mut *draw)
        });

        let counts = GenotypeCounts::tally(&cells);
        let next = Self {
            cells,
            generation: self.generation + 1,
            counts,
        };
        debug!(
            generation = next.generation,
            a1a1 = counts.a1a1,
            a1a2 = counts.a1a2,
            a2a2 = counts.a2a2,
            "migration step"
        );
        Ok(next)
    }

    pub fn size(&self) -> usize {
        self.cells.size
    }

    pub fn summary(&self) -> PopulationSummary {
        PopulationSummary::from_counts(self.counts)
    }
}

/// Driver-owned migration state: parameters, random source, current grid.
pub struct MigrationRun<D> {
    params: MigrationParams,
    draw: D,
    grid: MigrationGrid,
}

impl<D: RandomDraw> MigrationRun<D> {
    pub fn new(params: MigrationParams, mut draw: D) -> Result<Self> {
        params.validate()?;
        let grid = MigrationGrid::init(params.size, params.allele_frequency, &mut draw)?;
        Ok(Self { params, draw, grid })
    }

    pub fn grid(&self) -> &MigrationGrid {
        &self.grid
    }

    pub fn params(&self) -> &MigrationParams {
        &self.params
    }

    /// Takes effect from the next step; the current grid is kept. An absent
    /// distance leaves the current one in place.
    pub fn set_mating(&mut self, patch: &MatingPatch) -> Result<()> {
        if let Some(d) = patch.mating_distance {
            check_mating_distance(d)?;
            self.params.mating_distance = d;
        }
        Ok(())
    }

    /// Re-seed with new parameters, replacing the whole grid.
    pub fn restart(&mut self, params: MigrationParams) -> Result<()> {
        params.validate()?;
        self.grid = MigrationGrid::init(params.size, params.allele_frequency, &mut self.draw)?;
        self.params = params;
        Ok(())
    }
}

impl<D: RandomDraw + Send + 'static> Engine for MigrationRun<D> {
    type Snapshot = MigrationGrid;

    fn snapshot(&self) -> MigrationGrid {
        self.grid.clone()
    }

    fn advance(&mut self) -> Result<()> {
        self.grid = self.grid.step(self.params.mating_distance, &mut self.draw)?;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.restart(self.params.clone())
    }

    fn label(&self) -> &'static str {
        "migration"
    }
}
