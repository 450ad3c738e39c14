mod core;
mod datasets;
mod models;
use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cli = core::Cli::parse();
    let _log_handle = log4rs::init_config(core::build_log_config(&cli.command)?)?;

    match &cli.command {
        core::Command::Train(args) => core::run_train(args)?,
        core::Command::Learn(args) => core::run_learn(args)?,
        core::Command::Compare(args) => core::run_compare(args)?,
    }
    Ok(())
}
