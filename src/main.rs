//! regionshot: multi-monitor region selection overlay
//!
//! Without a capture backend attached, the binary runs a demo session over
//! generated test patterns (see `session`).

mod config;
mod logging;
mod session;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use regionshot_overlay::{CrashReporter, LogCrashReporter, OpenGlRenderer};
use regionshot_types::Rect;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::session::SessionError;

#[derive(Parser, Debug)]
#[command(version, about = "Multi-monitor region selection overlay")]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Display to cover, as X,Y,WxH; repeat for several displays
    #[arg(short, long = "display", value_name = "X,Y,WxH")]
    displays: Vec<Rect>,

    /// Brightness multiplier for the dimmed backdrop (0..1)
    #[arg(long)]
    dim: Option<f32>,

    /// Print the connected monitors and exit
    #[arg(long)]
    list_monitors: bool,

    /// Write the effective configuration back to the config file
    #[arg(long)]
    save_config: bool,
}

/// What to do once the renderer is up
enum Task {
    ListMonitors,
    Select { displays: Vec<Rect>, dim_factor: f32 },
}

fn main() -> ExitCode {
    let _log_guard = logging::init();
    let cli = Cli::parse();

    let mut config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "using default configuration");
            AppConfig::default()
        }
    };
    if let Some(dim) = cli.dim {
        config.selector.dim_factor = dim;
    }
    if !cli.displays.is_empty() {
        config.displays = cli.displays.clone();
    }
    if cli.save_config {
        match config.save(cli.config.as_deref()) {
            Ok(()) => {
                let path = cli.config.clone().or_else(|| AppConfig::default_path().ok());
                info!(?path, "configuration saved");
            }
            Err(e) => warn!(error = %e, "failed to save configuration"),
        }
    }

    let task = if cli.list_monitors {
        Task::ListMonitors
    } else {
        Task::Select {
            displays: config.displays.clone(),
            dim_factor: config.selector.dim_factor,
        }
    };

    match start(config, task) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "region selector failed");
            ExitCode::FAILURE
        }
    }
}

fn run_task(renderer: &OpenGlRenderer, task: Task) -> Result<(), SessionError> {
    match task {
        Task::ListMonitors => {
            for monitor in renderer.monitors()? {
                println!(
                    "{}{} {} @ {}Hz",
                    monitor.name,
                    if monitor.is_primary { " (primary)" } else { "" },
                    monitor.rect(),
                    monitor.refresh_rate
                );
            }
            Ok(())
        }
        Task::Select {
            displays,
            dim_factor,
        } => {
            let displays = session::resolve_displays(renderer, &displays)?;
            session::run(renderer, displays, dim_factor)
        }
    }
}

/// Run the renderer on the main thread and the task beside it
fn launch(config: AppConfig, task: Task) -> Result<(), SessionError> {
    let crash: Arc<dyn CrashReporter> = Arc::new(LogCrashReporter);
    OpenGlRenderer::init_on_current(config.selector, crash, move |renderer| {
        run_task(&renderer, task)
    })?
}

#[cfg(not(target_os = "macos"))]
fn start(config: AppConfig, task: Task) -> Result<(), SessionError> {
    launch(config, task)
}

/// Cocoa windows need the launched application; run inside its ready callback
#[cfg(target_os = "macos")]
fn start(config: AppConfig, task: Task) -> Result<(), SessionError> {
    use std::cell::RefCell;
    use std::rc::Rc;

    use regionshot_overlay::RendererError;

    let outcome = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&outcome);
    regionshot_overlay::platform::macos::run_application(move || {
        *slot.borrow_mut() = Some(launch(config, task));
    })?;

    let result = outcome.borrow_mut().take();
    result.unwrap_or_else(|| {
        Err(SessionError::Renderer(RendererError::GlfwInit(
            "application finished launching without running the overlay".to_string(),
        )))
    })
}
