/// Square row-major flat grid with toroidal addressing.
/// No per-cell objects; cells are small `Copy` enums.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid<T> {
    pub data: Vec<T>,
    pub size: usize,
}

impl<T: Copy> Grid<T> {
    pub fn filled(size: usize, value: T) -> Self {
        Self {
            data: vec![value; size * size],
            size,
        }
    }

    /// Build a grid by evaluating `f(row, col)` in row-major order.
    pub fn from_fn(size: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(size * size);
        for row in 0..size {
            for col in 0..size {
                data.push(f(row, col));
            }
        }
        Self { data, size }
    }

    #[inline]
    pub fn idx(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.size && col < self.size);
        row * self.size + col
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[self.idx(row, col)]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, v: T) {
        let i = self.idx(row, col);
        self.data[i] = v;
    }

    /// Read at any signed coordinate, wrapping both axes.
    #[inline]
    pub fn get_wrapped(&self, row: i64, col: i64) -> T {
        self.get(wrap(row, self.size), wrap(col, self.size))
    }

    pub fn count(&self, mut pred: impl FnMut(T) -> bool) -> usize {
        self.data.iter().filter(|&&c| pred(c)).count()
    }
}

/// Reduce any signed index into `[0, modulus)`.
///
/// Uses Euclidean remainder, so offsets several moduli away still land in
/// range (a single +/- correction would not).
#[inline]
pub fn wrap(index: i64, modulus: usize) -> usize {
    debug_assert!(modulus > 0);
    index.rem_euclid(modulus as i64) as usize
}

/// Offsets of the 8-connected (Moore) neighborhood, row-major.
pub const MOORE_OFFSETS: [(i64, i64); 8] = [
    (-1, -1), (-1, 0), (-1, 1),
    (0, -1),           (0, 1),
    (1, -1),  (1, 0),  (1, 1),
];

/// 8-connected neighbors with wrapping on both axes.
pub fn neighbors8_wrap(row: usize, col: usize, size: usize) -> impl Iterator<Item = (usize, usize)> {
    MOORE_OFFSETS.into_iter().map(move |(dr, dc)| {
        (
            wrap(row as i64 + dr, size),
            wrap(col as i64 + dc, size),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_is_congruent_and_in_range() {
        for modulus in 1..=12usize {
            let m = modulus as i64;
            for index in -5 * m..=5 * m {
                let w = wrap(index, modulus);
                assert!(w < modulus);
                assert_eq!((index - w as i64).rem_euclid(m), 0);
            }
        }
    }

    #[test]
    fn wrap_handles_far_offsets() {
        assert_eq!(wrap(-151, 75), 74);
        assert_eq!(wrap(150, 75), 0);
        assert_eq!(wrap(226, 75), 1);
    }

    #[test]
    fn corner_neighbors_wrap_both_axes() {
        let n: Vec<_> = neighbors8_wrap(0, 0, 4).collect();
        assert_eq!(n.len(), 8);
        assert!(n.contains(&(3, 3)));
        assert!(n.contains(&(3, 0)));
        assert!(n.contains(&(0, 3)));
        assert!(n.contains(&(1, 1)));
        assert!(!n.contains(&(0, 0)));
    }

    #[test]
    fn from_fn_is_row_major() {
        let g = Grid::from_fn(3, |r, c| r * 10 + c);
        assert_eq!(g.get(1, 2), 12);
        assert_eq!(g.data[5], 12);
        assert_eq!(g.get_wrapped(-1, 3), 20);
    }
}
