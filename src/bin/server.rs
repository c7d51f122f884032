use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine as _;
use image::ImageEncoder;
use image::codecs::png::PngEncoder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

use torusim::config::{
    DriftParams, DriverParams, EpidemicParams, MatingPatch, MigrationParams, RatesPatch,
};
use torusim::driver::{Driver, Engine};
use torusim::epidemic::{EpidemicCounts, EpidemicRun};
use torusim::migration::MigrationRun;
use torusim::rng::{ChaChaDraw, RandomDraw, seed_or_entropy};
use torusim::stats::PopulationSummary;
use torusim::{SimError, drift, render};

/// Pixels per grid cell; 75 cells -> 600 px.
const CELL_PX: usize = 8;

type ApiError = (StatusCode, String);
type Shared<E> = Arc<Mutex<Driver<E>>>;
type FrameResult<E> = Result<Json<Frame<<E as Served>::Stats>>, ApiError>;

/// Engines exposed over HTTP: how to restart them, retune them, and draw
/// their snapshots.
trait Served: Engine {
    type Params: DeserializeOwned + Send + 'static;
    /// Per-step settings; absent fields keep their current value.
    type Patch: DeserializeOwned + Send + 'static;
    type Stats: Serialize + Send;

    /// Re-seed the grid from fresh parameters.
    fn restart_with(&mut self, params: Self::Params) -> torusim::Result<()>;

    /// Apply per-step parameters, keeping the current grid.
    fn retune(&mut self, patch: Self::Patch) -> torusim::Result<()>;

    fn frame_parts(snapshot: &Self::Snapshot) -> FrameParts<Self::Stats>;
}

struct FrameParts<S> {
    generation: u64,
    size: usize,
    stats: S,
    rgba: Vec<u8>,
}

impl<D: RandomDraw + Send + 'static> Served for MigrationRun<D> {
    type Params = MigrationParams;
    type Patch = MatingPatch;
    type Stats = PopulationSummary;

    fn restart_with(&mut self, params: MigrationParams) -> torusim::Result<()> {
        self.restart(params)
    }

    fn retune(&mut self, patch: MatingPatch) -> torusim::Result<()> {
        self.set_mating(&patch)
    }

    fn frame_parts(grid: &Self::Snapshot) -> FrameParts<PopulationSummary> {
        FrameParts {
            generation: grid.generation,
            size: grid.size(),
            stats: grid.summary(),
            rgba: render::render_genotypes(&grid.cells, CELL_PX),
        }
    }
}

impl<D: RandomDraw + Send + 'static> Served for EpidemicRun<D> {
    type Params = EpidemicParams;
    type Patch = RatesPatch;
    type Stats = EpidemicCounts;

    fn restart_with(&mut self, params: EpidemicParams) -> torusim::Result<()> {
        self.restart(params)
    }

    fn retune(&mut self, patch: RatesPatch) -> torusim::Result<()> {
        self.set_rates(&patch)
    }

    fn frame_parts(grid: &Self::Snapshot) -> FrameParts<EpidemicCounts> {
        FrameParts {
            generation: grid.generation,
            size: grid.cells.size,
            stats: grid.counts,
            rgba: render::render_health(&grid.cells, CELL_PX),
        }
    }
}

#[derive(Serialize)]
struct Frame<S> {
    generation: u64,
    running: bool,
    size: usize,
    stats: S,
    data_url: String,
}

#[derive(Deserialize)]
struct DriftRequest {
    seed: Option<u64>,
    #[serde(flatten)]
    params: DriftParams,
}

#[derive(Serialize)]
struct DriftResponse {
    /// Seed actually used; send it back to replay the run.
    seed: u64,
    trajectories: Vec<Vec<f64>>,
    fixation_generation: Vec<Option<usize>>,
    chart: String,
}

fn api_error(e: SimError) -> ApiError {
    let status = match &e {
        SimError::InvalidParameter(_) | SimError::DegenerateStatistic { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        SimError::SchedulingConflict => StatusCode::CONFLICT,
    };
    (status, e.to_string())
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn encode_png(rgba: &[u8], w: usize, h: usize) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    let encoder = PngEncoder::new(&mut buf);
    encoder.write_image(rgba, w as u32, h as u32, image::ExtendedColorType::Rgba8)?;
    let b64 = base64::engine::general_purpose::STANDARD.encode(&buf);
    Ok(format!("data:image/png;base64,{}", b64))
}

fn frame<E: Served>(snapshot: &E::Snapshot, running: bool) -> FrameResult<E> {
    let parts = E::frame_parts(snapshot);
    let side = parts.size * CELL_PX;
    let data_url = encode_png(&parts.rgba, side, side).map_err(internal)?;
    Ok(Json(Frame {
        generation: parts.generation,
        running,
        size: parts.size,
        stats: parts.stats,
        data_url,
    }))
}

async fn drift_handler(Json(req): Json<DriftRequest>) -> Result<Json<DriftResponse>, ApiError> {
    req.params.validate().map_err(api_error)?;
    let seed = seed_or_entropy(req.seed);
    let params = req.params;

    let response = tokio::task::spawn_blocking(move || -> Result<DriftResponse, ApiError> {
        let trajectories = drift::simulate_replicates(
            params.population_size,
            params.generations,
            params.replicates,
            seed,
        )
        .map_err(api_error)?;
        let fixation_generation = trajectories
            .iter()
            .map(|t| drift::fixation_generation(t))
            .collect();
        let (w, h) = (700, 400);
        let chart = encode_png(&render::render_trajectories(&trajectories, w, h), w, h)
            .map_err(internal)?;
        Ok(DriftResponse {
            seed,
            trajectories,
            fixation_generation,
            chart,
        })
    })
    .await
    .map_err(internal)??;

    Ok(Json(response))
}

async fn frame_handler<E: Served>(State(driver): State<Shared<E>>) -> FrameResult<E> {
    let driver = driver.lock().await;
    frame::<E>(&driver.snapshot(), driver.is_running())
}

async fn reset_handler<E: Served>(
    State(driver): State<Shared<E>>,
    Json(params): Json<E::Params>,
) -> FrameResult<E> {
    let mut driver = driver.lock().await;
    let snapshot = driver
        .reset_with(|engine| engine.restart_with(params))
        .await
        .map_err(api_error)?;
    frame::<E>(&snapshot, driver.is_running())
}

async fn params_handler<E: Served>(
    State(driver): State<Shared<E>>,
    Json(patch): Json<E::Patch>,
) -> FrameResult<E> {
    let driver = driver.lock().await;
    driver
        .update(|engine| engine.retune(patch))
        .await
        .map_err(api_error)?;
    frame::<E>(&driver.snapshot(), driver.is_running())
}

async fn start_handler<E: Served>(
    State(driver): State<Shared<E>>,
    Json(req): Json<DriverParams>,
) -> FrameResult<E> {
    req.validate().map_err(api_error)?;
    let mut driver = driver.lock().await;
    if driver.is_running() {
        return Err(api_error(SimError::SchedulingConflict));
    }
    driver
        .set_interval(Duration::from_millis(req.interval_ms))
        .await
        .map_err(api_error)?;
    driver.start().await.map_err(api_error)?;
    frame::<E>(&driver.snapshot(), driver.is_running())
}

async fn interval_handler<E: Served>(
    State(driver): State<Shared<E>>,
    Json(req): Json<DriverParams>,
) -> FrameResult<E> {
    req.validate().map_err(api_error)?;
    let mut driver = driver.lock().await;
    driver
        .set_interval(Duration::from_millis(req.interval_ms))
        .await
        .map_err(api_error)?;
    frame::<E>(&driver.snapshot(), driver.is_running())
}

async fn pause_handler<E: Served>(State(driver): State<Shared<E>>) -> FrameResult<E> {
    let mut driver = driver.lock().await;
    driver.pause().await;
    frame::<E>(&driver.snapshot(), false)
}

async fn step_handler<E: Served>(State(driver): State<Shared<E>>) -> FrameResult<E> {
    let mut driver = driver.lock().await;
    let snapshot = driver.step_once().await.map_err(api_error)?;
    frame::<E>(&snapshot, false)
}

fn sim_routes<E: Served>() -> Router<Shared<E>> {
    Router::new()
        .route("/frame", get(frame_handler::<E>))
        .route("/reset", post(reset_handler::<E>))
        .route("/params", post(params_handler::<E>))
        .route("/start", post(start_handler::<E>))
        .route("/interval", post(interval_handler::<E>))
        .route("/pause", post(pause_handler::<E>))
        .route("/step", post(step_handler::<E>))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let interval = Duration::from_millis(DriverParams::default().interval_ms);
    let migration = Driver::new(
        MigrationRun::new(MigrationParams::default(), ChaChaDraw::from_entropy())?,
        interval,
    )?;
    let epidemic = Driver::new(
        EpidemicRun::new(EpidemicParams::default(), ChaChaDraw::from_entropy())?,
        interval,
    )?;

    let frontend = ServeDir::new("frontend");

    let app = Router::new()
        .route("/api/drift", post(drift_handler))
        .nest(
            "/api/migration",
            sim_routes::<MigrationRun<ChaChaDraw>>().with_state(Arc::new(Mutex::new(migration))),
        )
        .nest(
            "/api/epidemic",
            sim_routes::<EpidemicRun<ChaChaDraw>>().with_state(Arc::new(Mutex::new(epidemic))),
        )
        .fallback_service(frontend)
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    info!("torusim server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use torusim::rng::Rng;

    fn small_drift(seed: Option<u64>) -> DriftRequest {
        DriftRequest {
            seed,
            params: DriftParams {
                population_size: 20,
                generations: 30,
                replicates: 2,
            },
        }
    }

    #[tokio::test]
    async fn unseeded_drift_runs_differ_and_report_their_seed() {
        let a = drift_handler(Json(small_drift(None))).await.unwrap().0;
        let b = drift_handler(Json(small_drift(None))).await.unwrap().0;
        assert_ne!(a.seed, b.seed);

        let replay = drift_handler(Json(small_drift(Some(a.seed)))).await.unwrap().0;
        assert_eq!(replay.seed, a.seed);
        assert_eq!(replay.trajectories, a.trajectories);
    }

    #[tokio::test]
    async fn rate_update_keeps_unlisted_rates() {
        let params = EpidemicParams {
            size: 10,
            p_infect: 0.9,
            p_recover: 0.5,
            p_long_range: 0.3,
        };
        let driver = Driver::new(
            EpidemicRun::new(params, Rng::new(1)).unwrap(),
            Duration::from_millis(100),
        )
        .unwrap();
        let shared: Shared<EpidemicRun<Rng>> = Arc::new(Mutex::new(driver));

        let patch: RatesPatch = serde_json::from_str(r#"{"p_infect": 0.7}"#).unwrap();
        params_handler::<EpidemicRun<Rng>>(State(shared.clone()), Json(patch))
            .await
            .unwrap();

        let driver = shared.lock().await;
        let rates = driver.update(|run| Ok(run.params().clone())).await.unwrap();
        assert_eq!(rates.p_infect, 0.7);
        assert_eq!(rates.p_recover, 0.5);
        assert_eq!(rates.p_long_range, 0.3);
    }
}
