use std::sync::Once;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

const QUIET: &str = "warn";

/// Turns a `--log-level` value into filter directives. A bare level applies
/// to the compiler passes only; anything with a target or a list is taken
/// as written.
fn directives(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("{QUIET},{}={level}", env!("CARGO_CRATE_NAME"))
    }
}

fn filter(level: Option<&str>) -> Result<EnvFilter> {
    let directives = match level {
        Some(level) if !level.trim().is_empty() => directives(level),
        _ => std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| QUIET.to_string()),
    };
    EnvFilter::try_new(&directives).with_context(|| format!("Invalid log filter '{directives}'"))
}

/// Installs the stderr subscriber on first call; later calls only validate
/// `level`.
pub fn init(level: Option<&str>) -> Result<()> {
    let filter = filter(level)?;
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .without_time()
            .compact()
            .try_init();
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_levels_are_scoped_to_the_compiler() {
        assert_eq!(directives("debug"), "warn,scriptc=debug");
        assert_eq!(directives(" trace "), "warn,scriptc=trace");
    }

    #[test]
    fn explicit_directives_pass_through() {
        assert_eq!(directives("scriptc::codegen=trace"), "scriptc::codegen=trace");
        assert_eq!(directives("info,scriptc=debug"), "info,scriptc=debug");
    }

    #[test]
    fn rejects_malformed_filters() {
        let error = filter(Some("scriptc=loud")).unwrap_err();
        assert!(error.to_string().contains("scriptc=loud"), "{error}");
        assert!(filter(Some("info")).is_ok());
    }
}
