//! Command line interface.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use env_logger::Target;
use log::info;
use log::LevelFilter;

use crate::fzn::parser::parse_model;
use crate::presolve::Presolver;

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Presolver for flatzinc models.",
    long_about = None
)]
pub struct Args {
    /// Assume the downstream solver offloads boolean constraints to
    /// a SAT layer.
    #[arg(long)]
    pub sat: bool,

    /// Log every rule application.
    #[arg(short, long)]
    pub verbose: bool,

    /// Flatzinc model.
    #[arg(value_name = "FILE")]
    pub model: PathBuf,
}

/// Return command line args.
pub fn parse_args() -> Args {
    Args::parse()
}

/// Initialize logging according to the args.
pub fn init_logger(args: &Args) {
    env_logger::builder()
        .filter_level(if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .target(Target::Stdout)
        .init();
}

/// Run the presolver with the given args and print the simplified
/// model.
pub fn run(args: &Args) -> Result<()> {
    let content = fs::read_to_string(&args.model)?;
    let mut model = parse_model(content.as_str())?;

    let before = model.nb_active_constraints();
    let mut presolver = Presolver::new();
    let changed = presolver.run(&mut model);
    presolver.cleanup_for_solver(&mut model, args.sat);
    info!(
        "% presolve: {} -> {} active constraints{}",
        before,
        model.nb_active_constraints(),
        if changed { "" } else { " (unchanged)" }
    );

    print!("{}", model.fzn());
    Ok(())
}
