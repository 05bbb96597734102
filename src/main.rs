use std::process::exit;

use fzn_presolve::cli::init_logger;
use fzn_presolve::cli::parse_args;
use fzn_presolve::cli::run;

fn main() {
    let args = parse_args();
    init_logger(&args);
    if let Err(e) = run(&args) {
        eprintln!("{e:#}");
        exit(1);
    }
}
