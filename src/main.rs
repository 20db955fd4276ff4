use clap::Parser;
use rulebench::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    rulebench::logging::init_logging();
    run(Cli::parse())
}
