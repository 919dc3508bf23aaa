//! Configuration precedence resolution (spec.md §9 "Config": CLI > env >
//! file > defaults). Grounded in the teacher's `RunArgs`/`CiArgs` clap
//! structs (`assay-cli/src/cli/args/run.rs`): flags double as env vars via
//! `#[arg(env = "...")]`, and an optional YAML file fills in anything
//! neither the flags nor the environment set.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::AsrDenominatorMode;
use crate::quarantine::QuarantineMode;

/// Environment variable prefix every AIPO-controlled override uses
/// (spec.md §6 "Environment variables (prefix `AIPO_`)").
pub const ENV_PREFIX: &str = "AIPO_";

/// Resolved run configuration, after CLI/env/file/default layering has been
/// collapsed into one value per field. Nothing downstream re-derives
/// precedence; everything reads from here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub output_dir: Option<PathBuf>,
    pub reports_dir: Option<PathBuf>,
    pub transcripts_dir: Option<PathBuf>,
    pub log_level: String,
    pub seed: Option<u64>,
    pub sample_rate: f64,
    pub jailbreak_threshold: f64,
    pub quarantine_mode: String,
    pub asr_denominator_mode: String,
    pub incremental: bool,
    pub cache_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: None,
            reports_dir: None,
            transcripts_dir: None,
            log_level: "info".to_string(),
            seed: None,
            sample_rate: 1.0,
            jailbreak_threshold: 8.0,
            quarantine_mode: "warn".to_string(),
            asr_denominator_mode: "strict".to_string(),
            incremental: false,
            cache_enabled: true,
        }
    }
}

impl Config {
    pub fn quarantine_mode(&self) -> QuarantineMode {
        QuarantineMode::parse(&self.quarantine_mode)
    }

    pub fn asr_denominator_mode(&self) -> AsrDenominatorMode {
        match self.asr_denominator_mode.as_str() {
            "lenient" => AsrDenominatorMode::Lenient,
            _ => AsrDenominatorMode::Strict,
        }
    }

    /// Layer a partially-populated overlay (higher precedence) over `self`
    /// (lower precedence). `None`/default-valued fields in `overlay` leave
    /// `self`'s value untouched; a present value always wins.
    fn merge(mut self, overlay: ConfigOverlay) -> Self {
        if let Some(v) = overlay.output_dir {
            self.output_dir = Some(v);
        }
        if let Some(v) = overlay.reports_dir {
            self.reports_dir = Some(v);
        }
        if let Some(v) = overlay.transcripts_dir {
            self.transcripts_dir = Some(v);
        }
        if let Some(v) = overlay.log_level {
            self.log_level = v;
        }
        if let Some(v) = overlay.seed {
            self.seed = Some(v);
        }
        if let Some(v) = overlay.sample_rate {
            self.sample_rate = v;
        }
        if let Some(v) = overlay.jailbreak_threshold {
            self.jailbreak_threshold = v;
        }
        if let Some(v) = overlay.quarantine_mode {
            self.quarantine_mode = v;
        }
        if let Some(v) = overlay.asr_denominator_mode {
            self.asr_denominator_mode = v;
        }
        if let Some(v) = overlay.incremental {
            self.incremental = v;
        }
        if let Some(v) = overlay.cache_enabled {
            self.cache_enabled = v;
        }
        self
    }
}

/// Sparse view of [`Config`] used at each precedence layer: every field is
/// optional so "not set at this layer" is representable.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ConfigOverlay {
    pub output_dir: Option<PathBuf>,
    pub reports_dir: Option<PathBuf>,
    pub transcripts_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub seed: Option<u64>,
    pub sample_rate: Option<f64>,
    pub jailbreak_threshold: Option<f64>,
    pub quarantine_mode: Option<String>,
    pub asr_denominator_mode: Option<String>,
    pub incremental: Option<bool>,
    pub cache_enabled: Option<bool>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("malformed config file {path}: {source}")]
    Parse { path: PathBuf, source: serde_yaml::Error },
}

fn overlay_from_file(path: &Path) -> Result<ConfigOverlay, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
}

fn overlay_from_env() -> ConfigOverlay {
    let get = |suffix: &str| std::env::var(format!("{ENV_PREFIX}{suffix}")).ok();
    ConfigOverlay {
        output_dir: get("OUTPUT_DIR").map(PathBuf::from),
        reports_dir: get("REPORTS_DIR").map(PathBuf::from),
        transcripts_dir: get("TRANSCRIPTS_DIR").map(PathBuf::from),
        log_level: get("LOG_LEVEL"),
        seed: get("SEED").and_then(|v| v.parse().ok()),
        sample_rate: get("SAMPLE_RATE").and_then(|v| v.parse().ok()),
        jailbreak_threshold: get("JAILBREAK_THRESHOLD").and_then(|v| v.parse().ok()),
        quarantine_mode: get("QUARANTINE_MODE"),
        asr_denominator_mode: get("ASR_DENOMINATOR_MODE"),
        incremental: get("INCREMENTAL").and_then(|v| v.parse().ok()),
        cache_enabled: get("CACHE_ENABLED").and_then(|v| v.parse().ok()),
    }
}

/// Resolve a [`Config`] from the four precedence layers (spec.md §9
/// "Precedence resolution: CLI > env > file > defaults"). `file_path` is
/// optional: a missing config file is not an error, since defaults plus
/// env/CLI may be enough on their own.
pub fn resolve(
    cli_overlay: ConfigOverlay,
    file_path: Option<&Path>,
) -> Result<Config, ConfigError> {
    let mut config = Config::default();
    if let Some(path) = file_path {
        if path.exists() {
            config = config.merge(overlay_from_file(path)?);
        }
    }
    config = config.merge(overlay_from_env());
    config = config.merge(cli_overlay);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_overrides_them() {
        let config = resolve(ConfigOverlay::default(), None).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.sample_rate, 1.0);
    }

    #[test]
    fn cli_overlay_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("aipo.yaml");
        std::fs::write(&file, "log_level: debug\nsample_rate: 0.5\n").unwrap();
        let cli = ConfigOverlay { log_level: Some("trace".to_string()), ..Default::default() };
        let config = resolve(cli, Some(&file)).unwrap();
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.sample_rate, 0.5);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let config = resolve(ConfigOverlay::default(), Some(Path::new("/nonexistent/aipo.yaml")));
        assert!(config.is_ok());
    }

    #[test]
    fn quarantine_mode_parses_from_string_field() {
        let config = Config { quarantine_mode: "strict".to_string(), ..Default::default() };
        assert!(matches!(config.quarantine_mode(), QuarantineMode::Strict));
    }
}
