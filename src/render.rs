use rayon::prelude::*;

use crate::epidemic::HealthState;
use crate::genetics::Genotype;
use crate::grid::Grid;
use crate::rng::splitmix64;

// Genotype palette
const A1A1_COLOR: [u8; 4] = [255, 255, 255, 255]; // #ffffff
const A1A2_COLOR: [u8; 4] = [33, 118, 201, 255]; // #2176c9
const A2A2_COLOR: [u8; 4] = [4, 32, 41, 255]; // #042029

// SIR palette
const SUSCEPTIBLE_COLOR: [u8; 4] = [236, 240, 241, 255];
const INFECTED_COLOR: [u8; 4] = [200, 40, 40, 255];
const RECOVERED_COLOR: [u8; 4] = [110, 110, 120, 255];

const CHART_BG: [u8; 4] = [255, 255, 255, 255];
const CHART_GRID: [u8; 4] = [245, 245, 245, 255];

pub fn genotype_color(g: Genotype) -> [u8; 4] {
    match g {
        Genotype::A1A1 => A1A1_COLOR,
        Genotype::A1A2 => A1A2_COLOR,
        Genotype::A2A2 => A2A2_COLOR,
    }
}

pub fn health_color(s: HealthState) -> [u8; 4] {
    match s {
        HealthState::Susceptible => SUSCEPTIBLE_COLOR,
        HealthState::Infected => INFECTED_COLOR,
        HealthState::Recovered => RECOVERED_COLOR,
    }
}

/// Rasterize a cell grid, each cell drawn as a `cell_px` square.
/// Output is RGBA, `(size * cell_px)^2` pixels.
pub fn render_cells<T, F>(grid: &Grid<T>, cell_px: usize, color: F) -> Vec<u8>
where
    T: Copy + Sync,
    F: Fn(T) -> [u8; 4] + Sync,
{
    let cell_px = cell_px.max(1);
    let side = grid.size * cell_px;
    let mut rgba = vec![0u8; side * side * 4];

    rgba.par_chunks_mut(side * 4).enumerate().for_each(|(y, row)| {
        let r = y / cell_px;
        for x in 0..side {
            let c = color(grid.get(r, x / cell_px));
            row[x * 4..x * 4 + 4].copy_from_slice(&c);
        }
    });

    rgba
}

pub fn render_genotypes(grid: &Grid<Genotype>, cell_px: usize) -> Vec<u8> {
    render_cells(grid, cell_px, genotype_color)
}

pub fn render_health(grid: &Grid<HealthState>, cell_px: usize) -> Vec<u8> {
    render_cells(grid, cell_px, health_color)
}

/// Distinct opaque color per series index.
fn series_color(i: usize) -> [u8; 4] {
    let h = splitmix64(i as u64 * 7 + 123);
    [
        (h & 0xBF) as u8,
        ((h >> 8) & 0xBF) as u8,
        ((h >> 16) & 0xBF) as u8,
        255,
    ]
}

/// Line chart of allele-frequency trajectories, y in [0, 1].
/// Each series gets its own color; light gridlines every tenth of the axes.
pub fn render_trajectories(series: &[Vec<f64>], w: usize, h: usize) -> Vec<u8> {
    let mut rgba = vec![0u8; w * h * 4];
    if w < 2 || h < 2 {
        return rgba;
    }

    rgba.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
        let on_hline = (y * 10) % (h - 1) < 10;
        for x in 0..w {
            let on_vline = (x * 10) % (w - 1) < 10;
            let c = if on_hline || on_vline { CHART_GRID } else { CHART_BG };
            row[x * 4..x * 4 + 4].copy_from_slice(&c);
        }
    });

    let to_px = |i: usize, n: usize, p: f64| -> (f64, f64) {
        let x = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };
        (
            x * (w - 1) as f64,
            (1.0 - p.clamp(0.0, 1.0)) * (h - 1) as f64,
        )
    };

    for (si, s) in series.iter().enumerate() {
        let color = series_color(si);
        let n = s.len();
        for (i, pair) in s.windows(2).enumerate() {
            let a = to_px(i, n, pair[0]);
            let b = to_px(i + 1, n, pair[1]);
            draw_segment(&mut rgba, w, h, a, b, color);
        }
        if n == 1 {
            let a = to_px(0, 1, s[0]);
            draw_segment(&mut rgba, w, h, a, a, color);
        }
    }

    rgba
}

fn draw_segment(rgba: &mut [u8], w: usize, h: usize, a: (f64, f64), b: (f64, f64), color: [u8; 4]) {
    let steps = (b.0 - a.0).abs().max((b.1 - a.1).abs()).ceil().max(1.0) as usize;
    for k in 0..=steps {
        let t = k as f64 / steps as f64;
        let x = (a.0 + (b.0 - a.0) * t).round() as usize;
        let y = (a.1 + (b.1 - a.1) * t).round() as usize;
        if x < w && y < h {
            let i = (y * w + x) * 4;
            rgba[i..i + 4].copy_from_slice(&color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_scale_to_blocks() {
        let g = Grid::from_fn(2, |r, c| if (r + c) % 2 == 0 { Genotype::A1A1 } else { Genotype::A2A2 });
        let px = render_genotypes(&g, 3);
        assert_eq!(px.len(), 6 * 6 * 4);
        // pixel (x=4, y=1) lies in cell (0, 1)
        let i = (6 + 4) * 4;
        assert_eq!(&px[i..i + 4], &A2A2_COLOR);
        // pixel (x=5, y=5) lies in cell (1, 1)
        let i = (5 * 6 + 5) * 4;
        assert_eq!(&px[i..i + 4], &A1A1_COLOR);
    }

    #[test]
    fn health_palette_is_distinct() {
        let g = Grid::from_fn(1, |_, _| HealthState::Infected);
        assert_eq!(render_health(&g, 1), INFECTED_COLOR.to_vec());
        assert_ne!(health_color(HealthState::Susceptible), health_color(HealthState::Recovered));
    }

    #[test]
    fn trajectory_endpoints_are_drawn() {
        let (w, h) = (50, 20);
        let px = render_trajectories(&[vec![1.0, 0.0]], w, h);
        let color = series_color(0);
        // start: top-left, end: bottom-right
        assert_eq!(&px[0..4], &color);
        let i = ((h - 1) * w + (w - 1)) * 4;
        assert_eq!(&px[i..i + 4], &color);
    }
}
