//! graymgr - Entry Point
//!
//! Release and gray-rollout manager: drives releases through approval and
//! deployment, builds and publishes their artifacts and decides which devices
//! receive a new version.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::Context;
use colored::Colorize;
use graymgr::app::options::AppOptions;
use graymgr::app::run::run;
use graymgr::filesys::file::File;
use graymgr::logs::{init_logging, LogOptions};
use graymgr::storage::layout::StorageLayout;
use graymgr::storage::settings::{CompletionMode, Settings};
use graymgr::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", version.version),
        }
        return;
    }

    let layout = match cli_args.get("data-dir") {
        Some(dir) => StorageLayout::new(dir),
        None => StorageLayout::default(),
    };

    let settings = match load_settings(&layout, cli_args.get("config")).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {:#}", "Invalid settings:".red().bold(), e);
            std::process::exit(1);
        }
    };

    // Validate the settings and exit
    if cli_args.contains_key("check-config") {
        print_settings_summary(&settings);
        return;
    }

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level,
        json_format: settings.log_json,
        log_dir: settings
            .log_to_file
            .then(|| layout.logs_dir().path().to_path_buf()),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    // Run the manager
    let options = AppOptions::from_settings(&settings, layout);
    info!(
        "Running graymgr {} ({}) on {}:{}",
        version.version, version.git_hash, options.server.host, options.server.port
    );
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Failed to run the release manager: {e}");
        std::process::exit(1);
    }
}

async fn load_settings(
    layout: &StorageLayout,
    config_path: Option<&String>,
) -> anyhow::Result<Settings> {
    let file = match config_path {
        Some(path) => File::new(PathBuf::from(path)),
        None => {
            let file = layout.settings_file();
            if !file.exists().await {
                // Logging is not up yet
                eprintln!(
                    "{}",
                    format!("No settings file at {:?}, using defaults", file.path()).yellow()
                );
                return Ok(Settings::default());
            }
            file
        }
    };

    file.read_json::<Settings>()
        .await
        .with_context(|| format!("unable to read settings file {:?}", file.path()))
}

fn print_settings_summary(settings: &Settings) {
    println!("{}", "Settings OK".green().bold());
    println!("  server:     {}:{}", settings.server.host, settings.server.port);
    println!(
        "  jenkins:    {} (job {}, bins {})",
        settings.jenkins.url,
        settings.jenkins.job,
        settings.jenkins.bins.join(",")
    );
    println!(
        "  gitlab:     {} (project {}, {} on {})",
        settings.gitlab.url,
        settings.gitlab.project_id,
        settings.gitlab.version_file,
        settings.gitlab.mainline
    );
    match settings.deploy.completion {
        CompletionMode::Fixed { delay_secs } => {
            println!("  completion: fixed after {}s", delay_secs)
        }
        CompletionMode::External => println!("  completion: external"),
    }
    if settings.gitlab.project_id.is_empty() {
        println!("{}", "  warning: gitlab.project_id is empty".yellow());
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                _ => {
                    error!("Unable to install signal handlers, waiting for Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
