//! Main entry point for tabrecon CLI

use clap::Parser;
use tabrecon::cli::Cli;
use tabrecon::commands::execute_command;

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    if let Err(e) = execute_command(cli.command, cli.workspace.as_deref()) {
        eprintln!("Error: {}", e);
        if e.is_recoverable() {
            eprintln!("💡 Run `tabrecon show` to see where the workflow stands");
        }
        std::process::exit(1);
    }
}
