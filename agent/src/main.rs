//! Inventa Agent - Entry Point
//!
//! An endpoint agent that collects inventory data, buffers it through a
//! crash-durable local queue and ships it to the management service.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use inventagent::app::options::{AppOptions, StorageOptions};
use inventagent::app::run::run;
use inventagent::logs::{init_logging, LogOptions};
use inventagent::storage::layout::StorageLayout;
use inventagent::storage::settings::Settings;
use inventagent::utils::version_info;
use inventagent::workers::{collector, deployer, drain, heartbeat};

use tracing::{error, info, warn};

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
            Err(e) => eprintln!("Failed to serialize version info: {}", e),
        }
        return;
    }

    // Retrieve the settings file; a missing file means defaults, a
    // corrupt one is an operator mistake worth failing loudly on.
    let layout = match cli_args.get("base-dir") {
        Some(dir) => StorageLayout::new(dir.clone()),
        None => StorageLayout::default(),
    };
    let settings_file = layout.settings_file();
    let settings = if settings_file.exists().await {
        match settings_file.read_json::<Settings>().await {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Unable to read settings file: {}", e);
                return;
            }
        }
    } else {
        Settings::default()
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        println!("Failed to initialize logging: {e}");
    }

    if !settings_file.exists().await {
        warn!("No settings file found, running with defaults");
    }

    // Run the agent
    let options = AppOptions {
        transport: settings.transport_config(),
        storage: StorageOptions { layout },
        queue_max_retries: settings.queue.max_retries,
        enable_collector: settings.workers.enable_collector,
        enable_drain: settings.workers.enable_drain,
        enable_heartbeat: settings.workers.enable_heartbeat,
        enable_deployer: settings.workers.enable_deployer,
        collector: collector::Options {
            interval: Duration::from_secs(settings.workers.collect_interval_secs),
            ..Default::default()
        },
        drain: drain::Options {
            interval: Duration::from_secs(settings.workers.drain_interval_secs),
        },
        heartbeat: heartbeat::Options {
            interval: Duration::from_secs(settings.workers.heartbeat_interval_secs),
        },
        deployer: deployer::Options {
            interval: Duration::from_secs(settings.workers.deploy_poll_interval_secs),
        },
        ..Default::default()
    };

    info!("Running Inventa Agent with options: {:?}", options);
    let result = run(version.version, options, await_shutdown_signal()).await;
    if let Err(e) = result {
        error!("Failed to run the agent: {e}");
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let sigterm = signal(SignalKind::terminate());
        let sigint = signal(SignalKind::interrupt());

        match (sigterm, sigint) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("SIGTERM received, shutting down...");
                    }
                    _ = sigint.recv() => {
                        info!("SIGINT received, shutting down...");
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Ctrl+C received, shutting down...");
                    }
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl+C received, shutting down...");
    }
}
