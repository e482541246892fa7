use ship_battles::build::ShipBuild;
use ship_battles::components::ProjectileKind;
use ship_battles::config::Settings;
use ship_battles::game::{GameContext, GameManager, InputEvent};
use ship_battles::hull::HullSprite;
use ship_battles::render::LogRenderer;
use std::io::BufRead;
use std::process::ExitCode;
use std::sync::{Arc, mpsc};
use std::thread;
use tracing::{error, info, warn};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

fn main() -> ExitCode {
    // Load .env locally; safe to ignore when not present.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = Settings::from_env();
    let hull = match HullSprite::solid(settings.hull_width, settings.hull_height) {
        Ok(hull) => Arc::new(hull),
        Err(e) => {
            error!(error = %e, "invalid hull");
            return ExitCode::FAILURE;
        }
    };

    let build = match &settings.build_file {
        Some(path) => match ShipBuild::load(path) {
            Ok(build) => build,
            Err(e) => {
                error!(path = %path.display(), error = %e, "could not load ship build");
                return ExitCode::FAILURE;
            }
        },
        None => ShipBuild::debug_full(&hull, ProjectileKind::Laser),
    };

    // Commands arrive one per line on stdin.
    let (inputs, events) = mpsc::channel();
    let reader = thread::Builder::new().name("stdin".into()).spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match InputEvent::parse(&line) {
                Ok(event) => {
                    if inputs.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "ignored input"),
            }
        }
    });
    if let Err(e) = reader {
        error!(error = %e, "could not start input thread");
        return ExitCode::FAILURE;
    }

    info!(
        port = settings.port,
        tick_hz = settings.tick_hz,
        turrets = build.len(),
        "ship battles starting"
    );
    let context = GameContext {
        settings,
        hull,
        build,
    };
    let mut game = GameManager::new(context, events);
    match game.run(Box::new(LogRenderer::new())) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "game loop failed");
            ExitCode::FAILURE
        }
    }
}
