use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use kimlik_core::Extraction;
use kimlik_scan::Args;

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn print_json(extraction: &Extraction, pretty: bool) -> anyhow::Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(extraction)
    } else {
        serde_json::to_string(extraction)
    }
    .context("Failed to serialize extraction")?;
    println!("{}", json);
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match kimlik_scan::scan(&args) {
        Ok(extraction) => match print_json(&extraction, args.pretty) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("error: {:#}", e);
                ExitCode::from(1)
            }
        },
        Err(e) => {
            log::error!("[Scan] {}", e);
            eprintln!("{}", e.user_message());
            ExitCode::from(e.exit_code())
        }
    }
}
