// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! nfctl - LTE Network Function Launcher
//!
//! Starts the requested network-function containers one after another and
//! waits for each to accept connections before moving on.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use nfctl::catalog::{Catalog, CatalogSettings};
use nfctl::cli::{Cli, Commands, PlanArgs, RunArgs};
use nfctl::component::{ALIASES, ComponentTag};
use nfctl::config::Config;
use nfctl::network::HostNetworkProbe;
use nfctl::orchestrator::{Orchestrator, Plan};
use nfctl::readiness::ReadinessConfig;
use nfctl::runtime::{ContainerRuntime, DockerRuntime};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nfctl=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    if let Err(e) = dispatch(cli).await {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.cmd {
        Commands::Run(args) => run(args).await,
        Commands::Plan(args) => plan(args),
        Commands::Tags => print_tags(),
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    info!(
        runtime = %config.runtime_binary,
        registry = %config.registry,
        platform = %config.platform,
        "Starting nfctl"
    );

    let catalog = Catalog::standard(&CatalogSettings::from(&config))?;

    // Fail on a bad request before probing anything
    Plan::build(&catalog, args.tags.as_slice())?;

    let host = HostNetworkProbe::new(&config.probe_target)
        .discover()
        .await
        .map_err(nfctl::Error::from)
        .context("host network discovery failed")?;

    let runtime = Arc::new(DockerRuntime::new(&config.runtime_binary));
    info!(runtime_type = runtime.runtime_type(), "Runtime initialized");

    let readiness = ReadinessConfig {
        state_timeout: args
            .state_timeout
            .map(Duration::from_secs)
            .unwrap_or(config.state_timeout),
        socket_timeout: args
            .socket_timeout
            .map(Duration::from_secs)
            .unwrap_or(config.socket_timeout),
        ..ReadinessConfig::default()
    };

    let orchestrator =
        Orchestrator::new(runtime, catalog, host, &config.db_image).with_readiness(readiness);
    let report = orchestrator.run(args.tags.as_slice()).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for component in &report.components {
            println!("{:<5} {}", component.tag, component.phase);
            for container in &component.containers {
                let how = if container.reused { "reused" } else { "started" };
                println!("      {} {} ({})", container.name, container.address, how);
            }
        }
    }
    info!("All requested components are ready");
    Ok(())
}

fn plan(args: PlanArgs) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let catalog = Catalog::standard(&CatalogSettings::from(&config))?;
    let plan = Plan::build(&catalog, args.tags.as_slice())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }
    for (step, component) in plan.components.iter().enumerate() {
        if component.skipped {
            println!("{}. {} (not implemented, skipped)", step + 1, component.tag);
            continue;
        }
        println!("{}. {}", step + 1, component.tag);
        for unit in &component.units {
            if let Some(pre) = &unit.pre_start {
                println!("     provision: {}", pre);
            }
            println!("     start:     {} ({})", unit.name, unit.image);
            if let Some(post) = &unit.post_start {
                println!("     provision: {}", post);
            }
        }
    }
    Ok(())
}

fn print_tags() -> anyhow::Result<()> {
    let catalog = Catalog::standard(&CatalogSettings::default())?;
    for tag in ComponentTag::ALL {
        let Some(component) = catalog.get(tag) else {
            continue;
        };
        let deps: Vec<&str> = component.depends_on.iter().map(|t| t.as_str()).collect();
        let note = if component.implemented {
            ""
        } else {
            " (not implemented)"
        };
        if deps.is_empty() {
            println!("{}{}", tag, note);
        } else {
            println!("{} -> {}{}", tag, deps.join(", "), note);
        }
    }
    for alias in ALIASES {
        let expands: Vec<&str> = alias.expands_to.iter().map(|t| t.as_str()).collect();
        println!("{} = {}", alias.name, expands.join(" "));
    }
    Ok(())
}
