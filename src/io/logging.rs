//! Diagnostic logging for the `tb` binary.
//!
//! Logs go to stderr so they never mix with command output. The level comes
//! from `[log] level` in board.toml and `RUST_LOG` overrides it.

use std::sync::OnceLock;

use flexi_logger::{Logger, LoggerHandle};

static LOGGER: OnceLock<LoggerHandle> = OnceLock::new();

/// Map a configured level onto the names flexi_logger accepts
pub fn normalize_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "off" | "none" => Ok("off"),
        "error" => Ok("error"),
        "warn" | "warning" => Ok("warn"),
        "info" => Ok("info"),
        "debug" => Ok("debug"),
        "trace" => Ok("trace"),
        other => Err(format!("unsupported log level `{other}`")),
    }
}

/// Start the stderr logger. Later calls are no-ops.
///
/// An unknown level falls back to `warn` rather than failing the command.
pub fn init_logging(level: &str) -> Result<(), String> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let level = normalize_level(level).unwrap_or_else(|e| {
        eprintln!("warning: {e}; using `warn`");
        "warn"
    });
    let handle = Logger::try_with_env_or_str(level)
        .map_err(|err| format!("invalid log level `{level}`: {err}"))?
        .log_to_stderr()
        .format(flexi_logger::default_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;
    let _ = LOGGER.set(handle);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_normalize() {
        assert_eq!(normalize_level("WARN"), Ok("warn"));
        assert_eq!(normalize_level(" warning "), Ok("warn"));
        assert_eq!(normalize_level("none"), Ok("off"));
        assert!(normalize_level("loud").is_err());
    }
}
