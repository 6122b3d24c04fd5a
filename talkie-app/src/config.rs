//! Config file loading (§6): `$HOME/.talkie.conf`, falling back to
//! `$XDG_CONFIG_HOME/talkie.conf`, into a [`PipelineConfig`].
//!
//! `PipelineConfig` already derives `Deserialize` with `#[serde(default)]`
//! and its field set matches §6's config table verbatim, so no separate
//! `talkie-app`-side struct is needed — the loader's only job is finding
//! the file, tolerating its absence, and surfacing a `Config` error for a
//! present-but-invalid one.

use std::path::PathBuf;

use talkie_core::{Error, PipelineConfig, Result};
use tracing::{info, warn};

/// `$HOME/.talkie.conf`, or `$XDG_CONFIG_HOME/talkie.conf` when that
/// variable is set.
pub fn default_config_path() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("talkie.conf");
    }
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".talkie.conf")
}

/// Load the config file at `path`, returning [`PipelineConfig::default`]
/// if it does not exist (first run has no config yet) and a `Config`
/// error if it exists but fails to parse.
pub fn load(path: &std::path::Path) -> Result<PipelineConfig> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = ?path, "no config file found, using defaults");
            return Ok(PipelineConfig::default());
        }
        Err(e) => return Err(Error::Config(format!("reading {}: {e}", path.display()))),
    };

    let config: PipelineConfig = serde_json::from_str(&contents)
        .map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))?;
    info!(path = ?path, "config file loaded");
    if config.sample_rate == 0 {
        warn!("config file specifies sample_rate = 0; device negotiation will likely fail");
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    static COUNTER: std::sync::atomic::AtomicU32 = std::sync::atomic::AtomicU32::new(0);

    fn write_temp(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "talkie-config-test-{}-{}.json",
            std::process::id(),
            COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_file_returns_defaults() {
        let config = load(std::path::Path::new("/nonexistent/talkie.conf")).unwrap();
        assert_eq!(config.sample_rate, PipelineConfig::default().sample_rate);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let path = write_temp(r#"{"silence_seconds": 2.5}"#);
        let config = load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(config.silence_seconds, 2.5);
        assert_eq!(
            config.confidence_threshold,
            PipelineConfig::default().confidence_threshold
        );
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        let path = write_temp("not json");
        let err = load(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, Error::Config(_)));
    }
}
