// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Broker daemon.

use clap::Parser;
use std::path::PathBuf;

use faro::config::Config;
use faro::{Broker, Error};

#[derive(Debug, Parser)]
#[command(name = "faro", about = "MQTT broker engine for IoT runtimes")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    faro::log::init_log(&config.log)?;
    log::info!("faro: Starting broker");

    let (broker, _dispatcher) = Broker::start(config)?;
    broker.run_tcp().await
}
