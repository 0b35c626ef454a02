//! Binary entry point: loads configuration, connects to MPD, and runs the dynamizer loop (or a
//! single one-shot pass) until asked to stop.

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use dynamizer::config::{Config, ResolvedConfig};
use dynamizer::connection::{ConnectionInfo, ManagedConnection};
use dynamizer::control::Dispatcher;
use dynamizer::dynamizer::INBOUND_CHANNEL;
use dynamizer::Dynamizer;
use dynamizer::similar::SimilarArtistCache;
use dynamizer::status::StatusFacade;

fn main() -> ExitCode {
    let config = match Config::resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    install_tracing(&config);

    match run(config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "dynamizer exited with an error");
            ExitCode::FAILURE
        }
    }
}

fn install_tracing(config: &ResolvedConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = config.log_dir; // file-based logging destinations are configured via RUST_LOG/stderr
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Runs the daemon (or a single one-shot pass). Returns `Ok(true)` on a graceful exit with songs
/// in the queue, `Ok(false)` if a one-shot pass ended `NO_SONGS`.
fn run(config: ResolvedConfig) -> Result<bool, mpd_client::CommandError> {
    let _ = std::fs::create_dir_all(&config.files_dir);
    if let Some(parent) = config.active_file.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let info = ConnectionInfo {
        host: config.mpd_host.clone(),
        port: config.mpd_port,
        password: config.mpd_password.clone(),
    };

    let subscribe_channel = (!config.one_shot).then_some(INBOUND_CHANNEL);
    let mpd = ManagedConnection::connect(info, subscribe_channel)?;

    let dispatcher = Dispatcher::new(config.files_dir.clone(), config.active_file.clone());
    let status = Arc::new(StatusFacade::new());
    let similar_artists = SimilarArtistCache::load(config.files_dir.join("similar-artists.json"));

    let mut dynamizer = Dynamizer::new(mpd, dispatcher, Arc::clone(&status), similar_artists);

    if config.one_shot {
        return dynamizer.run_once();
    }

    // Server mode starts idle; a control message (`control:<id>:start:...`) toggles dynamic
    // mode on, same as the desktop client does on an existing install.
    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_shutdown = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("shutdown requested, stopping at next loop boundary");
        handler_shutdown.store(true, Ordering::Relaxed);
    }) {
        tracing::warn!(error = %e, "failed to install Ctrl-C handler");
    }

    let worker = std::thread::Builder::new()
        .name("dynamizer".to_owned())
        .spawn(move || dynamizer.run(&shutdown))
        .expect("failed to spawn dynamizer thread");

    worker.join().expect("dynamizer thread panicked");
    Ok(true)
}
