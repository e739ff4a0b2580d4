//! Validate subcommand implementation.

use crate::error::CliResult;
use crate::output;
use crate::types::Target;
use clap::Parser;

/// Resolve a target and look up its addresses.
#[derive(Parser, Debug)]
pub struct ValidateCommand {
    /// Target to check (host, host:port, or URL)
    #[arg(value_name = "TARGET")]
    pub target: String,
}

impl ValidateCommand {
    pub async fn execute(&self, quiet: bool) -> CliResult<()> {
        let target = Target::resolve(&self.target)?;
        let addresses = target.lookup().await?;

        if !quiet {
            output::print_success(&format!("{} is a valid target", target));
        }
        for ip in addresses {
            println!("{}", ip);
        }
        Ok(())
    }
}
