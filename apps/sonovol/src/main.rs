//! Sonovol - command-line controller for Sonos volume and grouping.
//!
//! Every command starts with a discovery pass. `watch` additionally runs the
//! live model: GENA subscriptions, the NOTIFY listener and the topology
//! monitor, until Ctrl+C or SIGTERM.

mod config;

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sonovol_core::{bootstrap_services, network_context, CoreServices, Target};
use tokio::signal;
use tokio_stream::StreamExt;

use crate::config::AppConfig;

/// Sonovol - discover Sonos speakers, control volume and manage groups.
#[derive(Parser, Debug)]
#[command(name = "sonovol")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE", env = "SONOVOL_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "warn", env = "SONOVOL_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Advertise IP address for event callbacks (overrides config file).
    #[arg(short = 'a', long)]
    advertise_ip: Option<std::net::IpAddr>,

    /// SSDP listen window in milliseconds (overrides config file).
    #[arg(short = 'w', long)]
    discovery_window_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover speakers and print devices and groups.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Show or change the volume of a speaker or its group.
    Volume {
        /// Speaker name, identifier or IP.
        name: String,
        /// Absolute level (0-100), relative change (+N / -N), or `+` / `-`
        /// for one configured step.
        #[arg(allow_hyphen_values = true)]
        level: Option<VolumeArg>,
        /// Address the whole group through its coordinator.
        #[arg(short, long)]
        group: bool,
    },
    /// Toggle mute of a speaker or its group.
    Mute {
        /// Speaker name, identifier or IP.
        name: String,
        /// Address the whole group through its coordinator.
        #[arg(short, long)]
        group: bool,
    },
    /// Group speakers around an automatically or explicitly chosen coordinator.
    Group {
        /// Speakers to group (at least two).
        #[arg(required = true, num_args = 2..)]
        names: Vec<String>,
        /// Speaker that must lead the group.
        #[arg(long)]
        coordinator: Option<String>,
    },
    /// Dissolve the group containing a speaker.
    Ungroup {
        /// Any member of the group.
        name: String,
    },
    /// Keep the model live and log every change until interrupted.
    Watch,
}

/// Volume argument of the `volume` subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VolumeArg {
    Set(i32),
    Change(i32),
    StepUp,
    StepDown,
}

impl FromStr for VolumeArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parse = |digits: &str| {
            digits
                .parse::<i32>()
                .map_err(|_| format!("invalid volume '{}'", s))
        };
        match s {
            "+" => Ok(Self::StepUp),
            "-" => Ok(Self::StepDown),
            _ => {
                if let Some(rest) = s.strip_prefix('+') {
                    parse(rest).map(Self::Change)
                } else if let Some(rest) = s.strip_prefix('-') {
                    parse(rest).map(|d| Self::Change(-d))
                } else {
                    parse(s).map(Self::Set)
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Sonovol v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(ip) = args.advertise_ip {
        config.advertise_ip = Some(ip);
    }
    if let Some(window) = args.discovery_window_ms {
        config.discovery_window_ms = window;
    }

    let services =
        bootstrap_services(config.to_core_config()).context("Failed to bootstrap services")?;

    run(&services, args.command).await
}

async fn run(services: &CoreServices, command: Command) -> Result<()> {
    let controller = &services.controller;
    controller
        .discover()
        .await
        .context("Speaker discovery failed")?;

    match command {
        Command::List { json } => print_model(services, json)?,
        Command::Volume { name, level, group } => {
            let target = target(name, group);
            let volume = match level {
                None => controller.get_volume(&target).await?,
                Some(VolumeArg::Set(level)) => Some(controller.set_volume(&target, level).await?),
                Some(VolumeArg::Change(delta)) => {
                    Some(controller.change_volume(&target, delta).await?)
                }
                Some(VolumeArg::StepUp) => Some(controller.volume_up(&target).await?),
                Some(VolumeArg::StepDown) => Some(controller.volume_down(&target).await?),
            };
            match volume {
                Some(volume) => println!("{}", volume),
                None => bail!("Volume of {:?} is unavailable", target),
            }
        }
        Command::Mute { name, group } => {
            let muted = controller.toggle_mute(&target(name, group)).await?;
            println!("{}", if muted { "muted" } else { "unmuted" });
        }
        Command::Group { names, coordinator } => {
            let plan = controller
                .create_group(&names, coordinator.as_deref())
                .await?;
            println!(
                "{} leads {} ({:?})",
                plan.coordinator.name,
                plan.members
                    .iter()
                    .map(|m| m.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                plan.reason
            );
        }
        Command::Ungroup { name } => {
            controller.dissolve_group(&name).await?;
            println!("dissolved group of {}", name);
        }
        Command::Watch => watch(services).await?,
    }
    Ok(())
}

fn target(name: String, group: bool) -> Target {
    if group {
        Target::Group(name)
    } else {
        Target::Device(name)
    }
}

fn print_model(services: &CoreServices, json: bool) -> Result<()> {
    let devices = services.controller.devices();
    let groups = services.controller.groups();
    if json {
        let doc = serde_json::json!({ "devices": devices, "groups": groups });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No speakers found");
        return Ok(());
    }
    for device in &devices {
        println!(
            "{:<24} {:<16} {:<16} {}",
            device.name,
            device.ip,
            device.model.as_deref().unwrap_or("-"),
            if device.is_coordinator { "coordinator" } else { "" }
        );
    }
    println!();
    for group in &groups {
        let names: Vec<String> = group
            .members
            .iter()
            .map(|id| {
                services
                    .state
                    .device(id)
                    .map_or_else(|| id.clone(), |d| d.name)
            })
            .collect();
        println!("{}: {}", group.name, names.join(", "));
    }
    Ok(())
}

/// Runs the live model until a shutdown signal arrives.
async fn watch(services: &CoreServices) -> Result<()> {
    let network = network_context(services.controller.config()).context(
        "Failed to auto-detect local IP address. \
         Please specify --advertise-ip or set SONOVOL_ADVERTISE_IP to the IP \
         address that Sonos speakers can reach.",
    )?;
    services
        .controller
        .start(network)
        .await
        .context("Failed to start the live model")?;

    let subscriptions = services.controller.subscriptions().await;
    log::info!("Watching {} subscription(s)", subscriptions.len());

    let mut events = services.events.stream();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            item = events.next() => match item {
                Some(Ok(event)) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => log::warn!("Unprintable event: {}", e),
                },
                Some(Err(e)) => log::warn!("Event stream lagged: {}", e),
                None => break,
            },
        }
    }

    log::info!("Shutdown signal received, cleaning up...");
    services.controller.shutdown().await;
    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
