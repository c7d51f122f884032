use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rng::RandomDraw;

/// Diploid genotype at a single bi-allelic locus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Genotype {
    A1A1,
    A1A2,
    A2A2,
}

impl Genotype {
    pub const ALL: [Genotype; 3] = [Genotype::A1A1, Genotype::A1A2, Genotype::A2A2];

    /// Copies of allele A1 carried.
    pub fn a1_copies(self) -> u8 {
        match self {
            Genotype::A1A1 => 2,
            Genotype::A1A2 => 1,
            Genotype::A2A2 => 0,
        }
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Genotype::A1A1 => "A1A1",
            Genotype::A1A2 => "A1A2",
            Genotype::A2A2 => "A2A2",
        })
    }
}

/// Sample one offspring from a Mendelian cross.
///
/// Symmetric in the parents. Consumes at most one uniform `r`:
/// - A1A2 x A1A2: `r < 0.25` gives A1A1, `r > 0.75` gives A2A2, anything else
///   (both 0.25 and 0.75 included) gives A1A2.
/// - Other segregating crosses split at `r < 0.5`, the lower bucket being the
///   genotype with more A1 copies.
/// - Homozygous-only crosses are deterministic and draw nothing.
pub fn offspring<D: RandomDraw + ?Sized>(p1: Genotype, p2: Genotype, draw: &mut D) -> Genotype {
    use Genotype::*;

    match (p1, p2) {
        (A1A1, A1A1) => A1A1,
        (A2A2, A2A2) => A2A2,
        (A1A1, A2A2) | (A2A2, A1A1) => A1A2,
        (A1A1, A1A2) | (A1A2, A1A1) => {
            if draw.uniform() < 0.5 { A1A1 } else { A1A2 }
        }
        (A1A2, A2A2) | (A2A2, A1A2) => {
            if draw.uniform() < 0.5 { A1A2 } else { A2A2 }
        }
        (A1A2, A1A2) => {
            let r = draw.uniform();
            if r < 0.25 {
                A1A1
            } else if r > 0.75 {
                A2A2
            } else {
                A1A2
            }
        }
    }
}

/// Exact offspring probabilities in (A1A1, A1A2, A2A2) order.
pub fn offspring_distribution(p1: Genotype, p2: Genotype) -> [f64; 3] {
    // Each parent transmits A1 with probability copies / 2.
    let a = p1.a1_copies() as f64 / 2.0;
    let b = p2.a1_copies() as f64 / 2.0;
    [
        a * b,
        a * (1.0 - b) + (1.0 - a) * b,
        (1.0 - a) * (1.0 - b),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{Rng, Scripted};
    use Genotype::*;

    #[test]
    fn table_matches_mendel() {
        assert_eq!(offspring_distribution(A1A1, A1A1), [1.0, 0.0, 0.0]);
        assert_eq!(offspring_distribution(A1A1, A1A2), [0.5, 0.5, 0.0]);
        assert_eq!(offspring_distribution(A1A1, A2A2), [0.0, 1.0, 0.0]);
        assert_eq!(offspring_distribution(A1A2, A1A2), [0.25, 0.5, 0.25]);
        assert_eq!(offspring_distribution(A1A2, A2A2), [0.0, 0.5, 0.5]);
        assert_eq!(offspring_distribution(A2A2, A2A2), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn het_cross_boundaries_fall_in_middle_bucket() {
        let mut s = Scripted::new(vec![0.2499, 0.25, 0.75, 0.7501]).unwrap();
        assert_eq!(offspring(A1A2, A1A2, &mut s), A1A1);
        assert_eq!(offspring(A1A2, A1A2, &mut s), A1A2);
        assert_eq!(offspring(A1A2, A1A2, &mut s), A1A2);
        assert_eq!(offspring(A1A2, A1A2, &mut s), A2A2);
    }

    #[test]
    fn crosses_are_symmetric() {
        for &a in &Genotype::ALL {
            for &b in &Genotype::ALL {
                for r in [0.0, 0.3, 0.5, 0.9] {
                    let x = offspring(a, b, &mut Scripted::constant(r));
                    let y = offspring(b, a, &mut Scripted::constant(r));
                    assert_eq!(x, y, "{a} x {b} at r = {r}");
                }
            }
        }
    }

    #[test]
    fn deterministic_crosses_draw_nothing() {
        let mut s = Scripted::constant(0.5);
        offspring(A1A1, A2A2, &mut s);
        offspring(A1A1, A1A1, &mut s);
        offspring(A2A2, A2A2, &mut s);
        assert_eq!(s.consumed(), 0);
    }

    #[test]
    fn het_cross_frequencies_converge() {
        let mut rng = Rng::new(2024);
        let n = 100_000;
        let mut counts = [0usize; 3];
        for _ in 0..n {
            let g = offspring(A1A2, A1A2, &mut rng);
            counts[2 - g.a1_copies() as usize] += 1;
        }
        let freq: Vec<f64> = counts.iter().map(|&c| c as f64 / n as f64).collect();
        // ~5 standard errors at n = 100k
        assert!((freq[0] - 0.25).abs() < 0.007, "{freq:?}");
        assert!((freq[1] - 0.50).abs() < 0.008, "{freq:?}");
        assert!((freq[2] - 0.25).abs() < 0.007, "{freq:?}");
    }
}
