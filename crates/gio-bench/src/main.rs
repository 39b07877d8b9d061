mod cli;
mod collective;
mod diag;
mod report;
mod runner;

use clap::Parser;
use gio_core::error::Result;
use gio_core::ExperimentConfig;
use log::error;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use cli::CliArgs;

fn main() {
    // `run` owns the MPI universe, so MPI_Finalize happens before exit.
    std::process::exit(run());
}

fn run() -> i32 {
    let Some(universe) = mpi::initialize() else {
        eprintln!("GIO:ERROR: MPI initialization failed");
        return 1;
    };
    let world = universe.world();
    let rank = world.rank();

    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Every rank sees the same arguments; only rank 0 prints usage.
            if rank == 0 {
                let _ = e.print();
            }
            return if e.use_stderr() { 1 } else { 0 };
        }
    };

    diag::init_logging(rank, args.verbose);

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    if rank == 0 {
        println!("{}", report::format_header(&config, world.size()));
    }

    match execute(&config, &world) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) if e.is_configuration() => {
            // Detected identically on every rank before any shared I/O.
            error!("{}", e);
            1
        }
        Err(e) => {
            error!("{}", e);
            error!("aborting all ranks");
            world.abort(1)
        }
    }
}

/// Run one experiment and report it. Returns `false` if any rank failed
/// read-back validation.
fn execute(config: &ExperimentConfig, world: &SimpleCommunicator) -> Result<bool> {
    if config.check_config {
        runner::verify_uniform_config(config, world)?;
    }

    let outcome = runner::run_experiment(config, world)?;

    Ok(report::report(
        config,
        &outcome.phases,
        outcome.validation.is_some(),
        world,
    ))
}
