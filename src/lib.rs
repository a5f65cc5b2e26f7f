pub mod agent_engine;
pub mod cli;
pub mod config;
pub mod errors;
pub mod executor;
pub mod planner;
pub mod surface;

#[cfg(test)]
pub(crate) mod testing;

use crate::agent_engine::engine::TurnLoop;
use crate::agent_engine::history::SessionHistory;
use crate::agent_engine::loop_control::LoopController;
use crate::agent_engine::state::LoopConfig;
use crate::cli::Cli;
use crate::config::{AppConfig, SurfaceKind};
use crate::errors::ScreenLoopResult;
use crate::executor::safety::{gate_from_config, SafetyGate};
use crate::planner::provider::Planner;
use crate::planner::providers::openai_responses::ResponsesPlanner;
use crate::planner::retry::RetryingPlanner;
use crate::planner::types::{DisplaySpec, TurnResponse};
use crate::surface::browser::BrowserSurface;
use crate::surface::container::ContainerSurface;
use crate::surface::Surface;

/// Runs one task end to end and returns the model's final response.
pub async fn run(cli: Cli) -> ScreenLoopResult<TurnResponse> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let mut cfg = match (&cli.config, config::load_config(cli.config.as_deref())) {
        (_, Ok(cfg)) => cfg,
        (Some(_), Err(e)) => return Err(e),
        (None, Err(e)) => {
            tracing::info!(reason = %e, "no config file; using defaults");
            AppConfig::default()
        }
    };
    cli.apply_to(&mut cfg);

    let api_key = cfg.take_api_key()?;
    let planner = RetryingPlanner::new(
        ResponsesPlanner::new(&cfg.planner, api_key)?,
        &cfg.planner.retry,
    );
    let gate = gate_from_config(&cfg.safety);

    let mut surface = open_surface(&cfg).await?;
    let result = drive(&cli.task, &cfg, &planner, gate.as_ref(), surface.as_mut()).await;
    if let Err(e) = surface.close().await {
        tracing::warn!(error = %e, "surface teardown failed");
    }
    result
}

async fn open_surface(cfg: &AppConfig) -> ScreenLoopResult<Box<dyn Surface>> {
    let (width, height) = (cfg.display.width, cfg.display.height);
    let surface: Box<dyn Surface> = match cfg.surface.kind {
        SurfaceKind::Browser => {
            Box::new(BrowserSurface::launch(&cfg.surface.browser, width, height).await?)
        }
        SurfaceKind::Container => {
            Box::new(ContainerSurface::attach(&cfg.surface.container, width, height).await?)
        }
    };
    tracing::info!(surface = ?cfg.surface.kind, width, height, "surface ready");
    Ok(surface)
}

/// Bootstrap round trip, then the turn loop. Ctrl-C stops the loop.
async fn drive(
    task: &str,
    cfg: &AppConfig,
    planner: &dyn Planner,
    gate: &dyn SafetyGate,
    surface: &mut dyn Surface,
) -> ScreenLoopResult<TurnResponse> {
    let (control, stop) = LoopController::new();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.stop();
        }
    });

    let declared = surface.display();
    let observation = control.guard(surface.capture_image()).await?;
    match observation.dimensions() {
        Ok(captured) => {
            if let Some(mismatch) = size_mismatch(captured, declared) {
                tracing::warn!(%mismatch, "screenshot size differs from declared display");
            }
        }
        Err(e) => tracing::debug!(error = %e, "could not read screenshot dimensions"),
    }

    tracing::info!(task, planner = planner.name(), "starting task");
    let result = async {
        let initial = control.guard(planner.begin(task, &observation, declared)).await?;
        let history = SessionHistory::from_config(&cfg.history);
        if let Some(path) = history.file_path() {
            tracing::info!(path = %path.display(), "recording session history");
        }
        let mut turn_loop = TurnLoop::new(
            planner,
            surface,
            gate,
            LoopConfig::from(&cfg.loop_timing),
            control,
            history,
        );
        turn_loop.run(initial).await
    }
    .await;

    interrupt.abort();
    result
}

/// `"<captured> vs <declared>"` when the first screenshot does not match the declared size.
fn size_mismatch(captured: (u32, u32), declared: DisplaySpec) -> Option<String> {
    let (width, height) = captured;
    if (width, height) == (declared.width, declared.height) {
        return None;
    }
    Some(format!(
        "captured {width}x{height} vs declared {}x{}",
        declared.width, declared.height
    ))
}
