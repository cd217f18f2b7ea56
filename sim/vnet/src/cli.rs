//! Parses the command line arguments and runs the chosen simulation.
//!
//! Basic usage for running the RIP simulation with JSON logging on:
//!
//! ```cargo run -- --log rip-chain```

use crate::simulations::{
    learning_switch, rip_chain, static_router, SimulationError, SimulationOptions,
};
use clap::{Parser, ValueEnum};
use std::{
    fs::{create_dir_all, OpenOptions},
    io,
    path::PathBuf,
    process::ExitCode,
    sync::Arc,
    time::Duration,
};
use thiserror::Error as ThisError;
use tracing_subscriber::{
    filter::ParseError,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, FmtSubscriber,
};

/// Stores the different command line arguments.
#[derive(Debug, Parser)]
#[command(version, about = "Runs simulated routers and switches")]
struct Args {
    /// Write JSON logs to ./logs instead of printing them.
    #[arg(short, long)]
    log: bool,
    /// Which events to record, as a filter such as `info` or `RIP=debug`.
    #[arg(short, long, default_value = "info")]
    verbosity: String,
    /// The simulation to run.
    #[arg(value_enum)]
    simulation: Simulation,
    /// Seconds to wait for the simulation's traffic before giving up.
    #[arg(short, long, default_value_t = 5)]
    duration: u64,
    /// A route table file for the static router.
    #[arg(long)]
    route_table: Option<PathBuf>,
    /// An ARP cache file for the static router.
    #[arg(long)]
    arp_cache: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Simulation {
    StaticRouter,
    RipChain,
    LearningSwitch,
}

/// Parses the command line, runs the simulation it names, and reports how
/// it went.
pub async fn initialize_from_arguments() -> ExitCode {
    let args = Args::parse();
    if let Err(error) = initialize_logging(args.log, &args.verbosity) {
        eprintln!("{error}");
        return ExitCode::FAILURE;
    }
    if args.simulation != Simulation::StaticRouter
        && (args.route_table.is_some() || args.arp_cache.is_some())
    {
        eprintln!("Table files only apply to the static router and are ignored");
    }

    let options = SimulationOptions {
        duration: Duration::from_secs(args.duration),
        route_table: args.route_table,
        arp_cache: args.arp_cache,
    };
    let result = match args.simulation {
        Simulation::StaticRouter => static_router(options).await,
        Simulation::RipChain => rip_chain(options).await,
        Simulation::LearningSwitch => learning_switch(options).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(SimulationError::Load(error)) => {
            eprintln!("Could not load the router's tables: {error}");
            ExitCode::FAILURE
        }
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Debug, ThisError)]
enum LoggingError {
    #[error("Invalid verbosity: {0}")]
    Filter(#[from] ParseError),
    #[error("Could not open the log file: {0}")]
    File(#[from] io::Error),
    #[error("Logging was already set up: {0}")]
    Install(#[from] TryInitError),
}

/// Installs the global subscriber. Only should be called once when the sim
/// starts. With `log` set, events are written as JSON to a new file under
/// `./logs`; otherwise they are printed to stderr.
fn initialize_logging(log: bool, verbosity: &str) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_new(verbosity)?;
    if log {
        let main_path = "./logs";
        create_dir_all(main_path)?;
        let file_path = format!(
            "{}/vnet-{}.log",
            main_path,
            chrono::offset::Local::now().format("%y-%m-%d_%H-%M-%S")
        );
        let file = OpenOptions::new()
            .write(true)
            .append(true)
            .create(true)
            .open(file_path)?;
        FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(Arc::new(file))
            .json()
            .finish()
            .try_init()?;
    } else {
        FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .finish()
            .try_init()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_command_line() {
        let args = Args::try_parse_from([
            "vnet",
            "--log",
            "--verbosity",
            "RIP=debug",
            "static-router",
            "--duration",
            "2",
            "--route-table",
            "routes.txt",
        ])
        .unwrap();
        assert!(args.log);
        assert_eq!(args.simulation, Simulation::StaticRouter);
        assert_eq!(args.duration, 2);
        assert_eq!(args.route_table, Some(PathBuf::from("routes.txt")));
        assert_eq!(args.arp_cache, None);
    }

    #[test]
    fn rejects_unknown_simulations() {
        assert!(Args::try_parse_from(["vnet", "ospf"]).is_err());
    }

    #[test]
    fn rejects_bad_verbosity() {
        assert!(matches!(
            initialize_logging(false, "RIP=loud"),
            Err(LoggingError::Filter(_))
        ));
    }
}
