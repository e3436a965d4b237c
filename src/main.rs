//! Grid game server entry point: CLI wiring and config-driven startup.

use std::process;

use grid_engine::cli::{self, CliCommand, CliOptions};
use grid_engine::config::GameConfig;
use tracing_subscriber::EnvFilter;

fn load_config(cli: &CliOptions) -> GameConfig {
    let loaded = if let Some(ref path) = cli.config {
        GameConfig::from_toml_file(path)
    } else {
        GameConfig::from_preset(cli.preset.as_deref().unwrap_or("demo"))
    };
    let mut config = match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    if let Some(ref bind) = cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(ref level) = cli.log_level {
        config.server.log_level = level.clone();
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }
    config
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    let cli = match cli::parse_args() {
        Ok(CliCommand::Run(opts)) => opts,
        Ok(CliCommand::Help) => {
            cli::print_usage();
            process::exit(0);
        }
        Err(e) => {
            eprintln!("error: {e}");
            cli::print_usage();
            process::exit(1);
        }
    };

    let config = load_config(&cli);
    init_logging(&config.server.log_level);

    #[cfg(feature = "api")]
    server::run(&config, cli.scores_out.as_deref());

    #[cfg(not(feature = "api"))]
    {
        let _ = config;
        eprintln!("error: built without the `api` feature; nothing to serve");
        process::exit(1);
    }
}

#[cfg(feature = "api")]
mod server {
    use std::path::Path;
    use std::process;
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use chrono::{Duration, Utc};
    use grid_engine::api::{self, AppState};
    use grid_engine::config::GameConfig;
    use grid_engine::io::export::export_scores_csv;
    use grid_engine::stats;
    use tracing::{error, info};

    pub fn run(config: &GameConfig, scores_out: Option<&Path>) {
        let addr = match config.socket_addr() {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        };
        let state = Arc::new(AppState::from_config(config));
        let ttl_secs = i64::try_from(config.telemetry.liveness_ttl_secs).unwrap_or(i64::MAX);
        let ttl = Duration::seconds(ttl_secs);
        let interval = StdDuration::from_secs(config.server.sweep_interval_secs);

        let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
            eprintln!("error: failed to create tokio runtime: {e}");
            process::exit(1);
        });

        rt.block_on(async {
            let sweeper_state = Arc::clone(&state);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    ticker.tick().await;
                    let dropped = sweeper_state.groups.sweep_stale(ttl, Utc::now());
                    if dropped > 0 {
                        info!(dropped, "boards marked disconnected");
                    }
                }
            });

            tokio::select! {
                res = api::serve(Arc::clone(&state), addr) => {
                    if let Err(e) = res {
                        error!(error = %e, "server failed");
                        process::exit(1);
                    }
                }
                _ = tokio::signal::ctrl_c() => info!("shutting down"),
            }
        });

        if let Some(path) = scores_out {
            let records = stats::all_score_history(&state.groups);
            if let Err(e) = export_scores_csv(&records, path) {
                eprintln!("error: failed to write CSV: {e}");
                process::exit(1);
            }
            eprintln!("Scores written to {}", path.display());
        }
    }
}
