use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use torusim::config::{DriftParams, EpidemicParams, MigrationParams};
use torusim::rng::{ChaChaDraw, RandomDraw, Rng, seed_or_entropy};
use torusim::{Timing, drift, render};

#[derive(Parser)]
#[command(name = "torusim", about = "Drift, migration and SIR simulations on a toroidal grid")]
struct Cli {
    /// Seed for a reproducible run; omitted means OS entropy.
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Allele-frequency drift in a well-mixed population.
    Drift {
        #[arg(long, default_value_t = 100)]
        population_size: usize,
        #[arg(long, default_value_t = 100)]
        generations: usize,
        #[arg(long, default_value_t = 1)]
        replicates: usize,
        /// Write a PNG chart of the trajectories.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Spatial mating with Mendelian inheritance.
    Migration {
        #[arg(long, default_value_t = 75)]
        size: usize,
        #[arg(long, default_value_t = 0.5)]
        allele_frequency: f64,
        #[arg(long, default_value_t = 1)]
        mating_distance: u32,
        #[arg(long, default_value_t = 100)]
        generations: u64,
        #[arg(long, default_value_t = 8)]
        cell_px: usize,
        /// Write a PNG of the final grid.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// SIR spread with long-range transmission.
    Epidemic {
        #[arg(long, default_value_t = 75)]
        size: usize,
        #[arg(long, default_value_t = 0.2)]
        p_infect: f64,
        #[arg(long, default_value_t = 0.1)]
        p_recover: f64,
        #[arg(long, default_value_t = 0.001)]
        p_long_range: f64,
        #[arg(long, default_value_t = 1_000)]
        max_steps: u64,
        #[arg(long, default_value_t = 8)]
        cell_px: usize,
        /// Write a PNG of the final grid.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut draw: Box<dyn RandomDraw> = match cli.seed {
        Some(seed) => Box::new(Rng::new(seed)),
        None => Box::new(ChaChaDraw::from_entropy()),
    };

    match cli.command {
        Command::Drift {
            population_size,
            generations,
            replicates,
            out,
        } => {
            let params = DriftParams {
                population_size,
                generations,
                replicates,
            };
            params.validate()?;
            // replaying with `--seed <seed>` reproduces every replicate
            let seed = seed_or_entropy(cli.seed);
            let trajectories =
                drift::simulate_replicates(population_size, generations, replicates, seed)?;
            let fixation: Vec<Option<usize>> =
                trajectories.iter().map(|t| drift::fixation_generation(t)).collect();
            if let Some(path) = out {
                let (w, h) = (700, 400);
                save_png(&path, &render::render_trajectories(&trajectories, w, h), w, h)?;
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "params": params,
                    "seed": seed,
                    "fixation_generation": fixation,
                    "trajectories": trajectories,
                }))?
            );
        }
        Command::Migration {
            size,
            allele_frequency,
            mating_distance,
            generations,
            cell_px,
            out,
        } => {
            let params = MigrationParams {
                size,
                allele_frequency,
                mating_distance,
            };
            let (history, timings) = torusim::run_migration(&params, generations, draw.as_mut())?;
            report_timings(&timings);
            if let Some(path) = out {
                let side = size * cell_px.max(1);
                save_png(&path, &render::render_genotypes(&history.last.cells, cell_px), side, side)?;
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "params": params,
                    "generation": history.last.generation,
                    "summaries": history.summaries,
                }))?
            );
        }
        Command::Epidemic {
            size,
            p_infect,
            p_recover,
            p_long_range,
            max_steps,
            cell_px,
            out,
        } => {
            let params = EpidemicParams {
                size,
                p_infect,
                p_recover,
                p_long_range,
            };
            let (history, timings) = torusim::run_epidemic(&params, max_steps, draw.as_mut())?;
            report_timings(&timings);
            if history.last.is_extinct() {
                info!(tick = history.last.generation, "outbreak over");
            }
            if let Some(path) = out {
                let side = size * cell_px.max(1);
                save_png(&path, &render::render_health(&history.last.cells, cell_px), side, side)?;
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "params": params,
                    "ticks": history.last.generation,
                    "counts": history.counts,
                }))?
            );
        }
    }

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn report_timings(timings: &[Timing]) {
    for t in timings {
        info!(stage = t.name, ms = t.ms, "timing");
    }
}

fn save_png(path: &Path, rgba: &[u8], w: usize, h: usize) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    image::save_buffer(path, rgba, w as u32, h as u32, image::ColorType::Rgba8)
        .with_context(|| format!("saving {}", path.display()))?;
    info!(path = %path.display(), "saved image");
    Ok(())
}
