use rayon::prelude::*;

use crate::error::{Result, SimError};
use crate::rng::{RandomDraw, Rng, derive_seed};

/// Starting frequency of allele A1. Not emitted as a trajectory entry.
pub const INITIAL_FREQUENCY: f64 = 0.5;

/// Wright-Fisher drift in one well-mixed population.
///
/// Each generation draws `2 * population_size` gene copies, each A1 with the
/// previous generation's frequency. Returns one frequency per generation;
/// entry 0 is already a post-draw value.
pub fn simulate<D: RandomDraw + ?Sized>(
    population_size: usize,
    generations: usize,
    draw: &mut D,
) -> Result<Vec<f64>> {
    if population_size == 0 {
        return Err(SimError::invalid("population_size must be positive"));
    }

    let copies = 2 * population_size;
    let mut p = INITIAL_FREQUENCY;
    let mut trajectory = Vec::with_capacity(generations);
    for _ in 0..generations {
        let mut a1 = 0usize;
        for _ in 0..copies {
            if draw.uniform() < p {
                a1 += 1;
            }
        }
        p = a1 as f64 / copies as f64;
        trajectory.push(p);
    }
    Ok(trajectory)
}

/// Run independent trajectories in parallel, replicate `i` seeded from
/// `derive_seed(seed, i)`. Output order matches replicate index.
pub fn simulate_replicates(
    population_size: usize,
    generations: usize,
    replicates: usize,
    seed: u64,
) -> Result<Vec<Vec<f64>>> {
    (0..replicates)
        .into_par_iter()
        .map(|i| {
            let mut rng = Rng::new(derive_seed(seed, i as u64));
            simulate(population_size, generations, &mut rng)
        })
        .collect()
}

/// First generation index at which an allele is lost or fixed.
pub fn fixation_generation(trajectory: &[f64]) -> Option<usize> {
    trajectory.iter().position(|&p| p == 0.0 || p == 1.0)
}
