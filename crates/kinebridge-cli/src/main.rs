//! `kinebridge` – starts the relay / REST server.
//!
//! 1. Loads `~/.kinebridge/config.toml` (defaults when absent) and applies
//!    `KINEBRIDGE_*` overrides.
//! 2. Initialises tracing (see [`telemetry`]).
//! 3. Serves on `0.0.0.0:<port>` until **Ctrl-C**, then shuts down
//!    gracefully.

mod config;
mod telemetry;

use colored::Colorize;
use std::process::ExitCode;
use tracing::{error, info};

use kinebridge_server::{AppState, KineServer};

fn main() -> ExitCode {
    let _guard = telemetry::init_tracing("kinebridge");

    print_banner();

    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };
    print_summary(&cfg);

    let state = match AppState::new(cfg.relay(), &cfg.projects_dir, &cfg.data_dir) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, dir = %cfg.projects_dir.display(), "cannot open project store");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(
        KineServer::new(state)
            .with_port(cfg.port)
            .run(shutdown_signal()),
    );

    match result {
        Ok(()) => {
            println!("{}", "  ✓ kinebridge stopped.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "server exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    println!();
    println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
    info!("shutdown requested");
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   __ __ _           __        _    __         "#.bold().cyan());
    println!("{}", r#"  / //_/(_)__  ___  / /  ____(_)__/ /__ ____  "#.bold().cyan());
    println!("{}", r#" / ,<  / / _ \/ -_)/ _ \/ __/ / _  / _ `/ -_) "#.bold().cyan());
    println!("{}", r#"/_/|_|/_/_//_/\__//_.__/_/ /_/\_,_/\_, /\__/  "#.bold().cyan());
    println!("{}", r#"                                  /___/       "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "kinebridge".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  rosbridge relay & motion-data server");
    println!();
}

fn print_summary(cfg: &config::Config) {
    println!("  Config      {}", config::config_path().display().to_string().dimmed());
    println!("  rosbridge   {}", cfg.rosbridge_url.bold());
    println!(
        "  Topics      {} → /ws/bridge/, {} → /ws/flexbelogs/",
        cfg.bridge_topic.bold(),
        cfg.log_topic.bold()
    );
    println!("  Projects    {}", cfg.projects_dir.display());
    println!("  Motion data {}", cfg.data_dir.display());
    println!(
        "  Listening   {}",
        format!("http://0.0.0.0:{}", cfg.port).bold().green()
    );
    println!();
}
