use std::process::ExitCode;

use clap::Parser;

mod commands;
mod printer;

use commands::Command;
use manidx_runtime::logging;

#[derive(Debug, Parser)]
#[command(
    name = "manidx",
    version,
    about = "Binary file manifests for backup archives",
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

fn main() -> ExitCode {
    logging::init().ok();

    let cli = Cli::parse();
    match cli.command {
        Command::Build(args) => commands::build::run(args),
        Command::Info(args) => commands::info::run(args),
        Command::List(args) => commands::list::run(args),
        Command::Tree(args) => commands::tree::run(args),
        Command::Diff(args) => commands::diff::run(args),
        Command::Reset(args) => commands::reset::run(args),
    }
}
