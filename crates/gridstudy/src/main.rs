use clap::Parser;
use gridstudy::{Cli, commands, init_logging};

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let _guard = init_logging(&cli.log_level, cli.log_file.as_deref())?;

    commands::execute(cli.command)?;

    tracing::debug!("Done");
    Ok(())
}
