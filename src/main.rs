// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{io, net::SocketAddr, path::PathBuf, process::ExitCode, time::Duration};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use thermal_modbus::{
    client::tcp,
    config::{
        ClientConfig, DebugFlag, LogRate, ServerConfig, TargetTemperature, DEFAULT_BIND_ADDR,
        DEFAULT_SERVER_ADDR, DEFAULT_TIMEOUT,
    },
    scheduler::PollScheduler,
    sensor::ThermalZone,
    server::{Server, Terminated},
};

/// CPU temperature supervision over Modbus TCP
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Serve the temperature and control registers
    Server {
        /// Verbose diagnostics (Y/N)
        debug: DebugFlag,

        /// Listen address
        #[arg(long, default_value_t = DEFAULT_BIND_ADDR)]
        bind: SocketAddr,

        /// Millidegree sensor file
        #[arg(long, default_value = ThermalZone::DEFAULT_PATH)]
        sensor: PathBuf,
    },
    /// Poll the server and demand start/stop
    Client {
        /// Poll period in seconds, forced into [3, 60]
        #[arg(allow_negative_numbers = true)]
        logging_rate: i64,

        /// Verbose diagnostics (Y/N)
        debug: DebugFlag,

        /// Server address
        #[arg(long, default_value_t = DEFAULT_SERVER_ADDR)]
        server: SocketAddr,

        /// Connect and request timeout in seconds
        #[arg(
            long,
            default_value_t = DEFAULT_TIMEOUT.as_secs(),
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        timeout: u64,
    },
}

impl Mode {
    const fn debug(&self) -> DebugFlag {
        match self {
            Self::Server { debug, .. } | Self::Client { debug, .. } => *debug,
        }
    }
}

fn init_logger(debug: DebugFlag) {
    let level = if debug.is_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    let debug = args.mode.debug();
    init_logger(debug);
    if debug.is_enabled() {
        log::debug!("Debug output enabled");
    }

    match run(args.mode).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(mode: Mode) -> anyhow::Result<()> {
    match mode {
        Mode::Server {
            debug,
            bind,
            sensor,
        } => {
            let config = ServerConfig {
                bind_addr: bind,
                sensor_path: sensor,
                debug,
            };
            run_server(config).await
        }
        Mode::Client {
            logging_rate,
            debug,
            server,
            timeout,
        } => {
            let config = ClientConfig {
                server_addr: server,
                log_rate: LogRate::from_arg(logging_rate)?,
                timeout: Duration::from_secs(timeout),
                debug,
            };
            run_client(config).await
        }
    }
}

async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    log::info!("Starting server...");
    let sensor = ThermalZone::new(config.sensor_path);
    let server = Server::bind(config.bind_addr)?;
    log::info!("Server is listening on {}", server.local_addr()?);
    match server.serve(&sensor).await? {
        Terminated::RequestCeiling => log::info!("Server shutdown complete"),
    }
    Ok(())
}

async fn run_client(config: ClientConfig) -> anyhow::Result<()> {
    let target = TargetTemperature::prompt(&mut io::stdin().lock(), &mut io::stdout())
        .context("Failed to read the target temperature")?;
    log::debug!("Target temperature: {} m°C", target.millidegrees());

    log::info!("Starting client");
    let mut ctx = tcp::connect(config.server_addr, config.timeout)
        .await
        .with_context(|| format!("Connection to {} failed", config.server_addr))?;
    log::info!("Connected to server");

    PollScheduler::new(config.log_rate, target)
        .run(&mut ctx)
        .await;
    Ok(())
}
