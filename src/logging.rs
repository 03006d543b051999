//! Logging setup
//!
//! One `tracing` subscriber per process, filtered by `RUST_LOG` when set and
//! by the configured level otherwise.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Pick the filter directive from the configured level and `-q` / `-v` flags.
///
/// Flags win over the configured level.
pub fn level_for_flags(configured: &str, quiet: bool, verbose: u8) -> String {
    if quiet {
        return "error".to_string();
    }
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Build the filter, preferring `RUST_LOG` over `level`
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Logs go to stderr, or are appended to `file` when given. A second call
/// is a no-op.
pub fn init(level: &str, file: Option<&Path>) -> std::io::Result<()> {
    let filter = build_filter(level);

    match file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .try_init();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_flags() {
        assert_eq!(level_for_flags("info", false, 0), "info");
        assert_eq!(level_for_flags("warn", false, 1), "debug");
        assert_eq!(level_for_flags("info", false, 3), "trace");
        assert_eq!(level_for_flags("debug", true, 2), "error");
    }

    #[test]
    fn test_init_with_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("validator.log");
        init("info", Some(&path)).unwrap();
        assert!(path.exists());
    }
}
