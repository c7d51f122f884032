pub mod config;
pub mod drift;
pub mod driver;
pub mod epidemic;
pub mod error;
pub mod genetics;
pub mod grid;
pub mod migration;
pub mod render;
pub mod rng;
pub mod stats;

use std::time::Instant;

use tracing::info;

use config::{EpidemicParams, MigrationParams};
use epidemic::{EpidemicCounts, EpidemicGrid};
use migration::MigrationGrid;
use rng::RandomDraw;
use stats::PopulationSummary;

pub use error::{Result, SimError};

pub struct Timing {
    pub name: &'static str,
    pub ms: f64,
}

/// Outcome of a fixed-length migration run.
pub struct MigrationHistory {
    /// One entry per generation, starting with the initial grid.
    pub summaries: Vec<PopulationSummary>,
    pub last: MigrationGrid,
}

/// Outcome of an epidemic run.
pub struct EpidemicHistory {
    /// S/I/R counts per tick, starting with the seeded grid.
    pub counts: Vec<EpidemicCounts>,
    pub last: EpidemicGrid,
}

/// Seed a migration grid and step it `generations` times.
pub fn run_migration<D: RandomDraw + ?Sized>(
    params: &MigrationParams,
    generations: u64,
    draw: &mut D,
) -> Result<(MigrationHistory, Vec<Timing>)> {
    params.validate()?;
    let mut timings = Vec::new();

    let t = Instant::now();
    let mut grid = MigrationGrid::init(params.size, params.allele_frequency, draw)?;
    timings.push(Timing {
        name: "init",
        ms: t.elapsed().as_secs_f64() * 1000.0,
    });

    let t = Instant::now();
    let mut summaries = Vec::with_capacity(generations as usize + 1);
    summaries.push(grid.summary());
    for _ in 0..generations {
        grid = grid.step(params.mating_distance, draw)?;
        let summary = grid.summary();
        info!(
            generation = grid.generation,
            a1a1 = summary.counts.a1a1,
            a1a2 = summary.counts.a1a2,
            a2a2 = summary.counts.a2a2,
            f = %summary.f_display(),
            "generation"
        );
        summaries.push(summary);
    }
    timings.push(Timing {
        name: "steps",
        ms: t.elapsed().as_secs_f64() * 1000.0,
    });

    Ok((MigrationHistory { summaries, last: grid }, timings))
}

/// Seed an outbreak and step until no one is infected or `max_steps` ticks
/// have run.
pub fn run_epidemic<D: RandomDraw + ?Sized>(
    params: &EpidemicParams,
    max_steps: u64,
    draw: &mut D,
) -> Result<(EpidemicHistory, Vec<Timing>)> {
    params.validate()?;
    let mut timings = Vec::new();

    let t = Instant::now();
    let mut grid = EpidemicGrid::init(params.size, draw)?;
    let mut counts = vec![grid.counts];
    while !grid.is_extinct() && grid.generation < max_steps {
        grid = grid.step(params, draw)?;
        info!(
            tick = grid.generation,
            susceptible = grid.counts.susceptible,
            infected = grid.counts.infected,
            recovered = grid.counts.recovered,
            "tick"
        );
        counts.push(grid.counts);
    }
    timings.push(Timing {
        name: "outbreak",
        ms: t.elapsed().as_secs_f64() * 1000.0,
    });

    Ok((EpidemicHistory { counts, last: grid }, timings))
}
