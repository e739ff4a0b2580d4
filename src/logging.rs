//! Tracing subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

/// Environment variable consulted when `RUST_LOG` is unset.
pub const LOG_ENV: &str = "VULNSCAN_LOG";

/// Filter directive used when neither environment variable is set.
pub fn default_directive(verbose: bool, quiet: bool) -> &'static str {
    if quiet {
        "warn"
    } else if verbose {
        "vulnscan=debug"
    } else {
        "vulnscan=info"
    }
}

fn filter(verbose: bool, quiet: bool) -> EnvFilter {
    let directive = std::env::var("RUST_LOG")
        .or_else(|_| std::env::var(LOG_ENV))
        .unwrap_or_else(|_| default_directive(verbose, quiet).to_string());
    EnvFilter::try_new(&directive)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)))
}

/// Install the global subscriber, logging to stderr so stdout stays clean for reports.
pub fn init(verbose: bool, quiet: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbose, quiet))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false, false), "vulnscan=info");
        assert_eq!(default_directive(true, false), "vulnscan=debug");
        assert_eq!(default_directive(true, true), "warn");
    }
}
