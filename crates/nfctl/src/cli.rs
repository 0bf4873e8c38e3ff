// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Command-line interface.

use clap::{Args, Parser, Subcommand};

/// Launch LTE core and radio network functions as containers.
#[derive(Parser, Debug)]
#[command(name = "nfctl", version, about)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch components and wait until each is ready
    Run(RunArgs),
    /// Show what `run` would launch, without touching the runtime
    Plan(PlanArgs),
    /// List known component tags and aliases
    Tags,
}

/// Arguments of `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Component tags or aliases (e.g. EPC, ENB)
    #[arg(required = true)]
    pub tags: Vec<String>,

    /// Seconds to wait for each container to be running
    #[arg(long, value_name = "SECS")]
    pub state_timeout: Option<u64>,

    /// Seconds to wait for each service socket to accept connections
    #[arg(long, value_name = "SECS")]
    pub socket_timeout: Option<u64>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments of `plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Component tags or aliases
    #[arg(required = true)]
    pub tags: Vec<String>,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}
