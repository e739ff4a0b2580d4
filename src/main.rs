use clap::Parser;
use std::process::ExitCode;
use vulnscan::cli::{self, Cli, Commands};
use vulnscan::error::CliError;
use vulnscan::{logging, output};

/// Exit code for a target that cannot be resolved.
const EXIT_INVALID_TARGET: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::print_error(&format!("{:#}", err));
            match err.downcast_ref::<CliError>() {
                Some(CliError::Target(_)) => ExitCode::from(EXIT_INVALID_TARGET),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Scan(cmd) => {
            let settings = cli::load_settings(cli.config.as_deref())?;
            // Completed and partially failed scans both exit 0.
            cmd.execute(&settings, cli.verbose, cli.quiet).await?;
        }
        Commands::Validate(cmd) => cmd.execute(cli.quiet).await?,
        Commands::Show(cmd) => cmd.execute()?,
    }
    Ok(())
}
