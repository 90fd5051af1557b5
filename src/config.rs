//! Rig configuration
//!
//! Loaded once at startup from, lowest to highest priority:
//! 1. built-in defaults
//! 2. `config/default.toml`
//! 3. `config/user.toml` (operator overrides, not version controlled)
//! 4. Environment variables (`SLANT_SECTION__KEY`)

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use slant_core::DisplayConfig;
use slant_experiment::ExperimentConfig;
use slant_sensor::SensorConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RigConfig {
    #[serde(default)]
    pub experiment: ExperimentConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

impl RigConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load from a specific config directory. Missing files are skipped.
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let mut figment = Figment::from(Serialized::defaults(RigConfig::default()));

        for name in ["default.toml", "user.toml"] {
            let path = config_dir.join(name);
            if path.exists() {
                figment = figment.merge(Toml::file(&path));
            }
        }

        // SLANT_EXPERIMENT__FIXATION_MS=750 -> experiment.fixation_ms = 750
        figment = figment.merge(Env::prefixed("SLANT_").split("__"));

        Ok(figment.extract()?)
    }
}

/// Where stimulus images and the message font live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Holds `colormaps/`, `heightmaps/` and `normalmaps/`
    pub stimuli_dir: PathBuf,
    pub font_path: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            stimuli_dir: PathBuf::from("img/stimuli"),
            font_path: PathBuf::from("assets/DejaVuSans.ttf"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Root of the per-participant directories
    pub dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(#[from] figment::Error);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_rig() {
        let config = RigConfig::default();
        assert_eq!(config.experiment.fixation_ms, 500);
        assert_eq!(config.display.view_distance, 100.0);
        assert_eq!(config.sensor.angle_offset, 90.0);
        assert_eq!(config.data.dir, PathBuf::from("data"));
    }

    #[test]
    fn serializes_every_section() {
        let toml = toml::to_string(&RigConfig::default()).unwrap();
        for section in ["[experiment]", "[display]", "[assets]", "[sensor]", "[data]", "[debug]"] {
            assert!(toml.contains(section), "missing {section}");
        }
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.toml"),
            "[experiment]\nfixation_ms = 750\nslants = [45.0, 60.0]\n",
        )
        .unwrap();
        let config = RigConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.experiment.fixation_ms, 750);
        assert_eq!(config.experiment.slants, vec![45.0, 60.0]);
        assert_eq!(config.experiment.break_duration_ms, 10_000);
        assert_eq!(config.display.near, 40.0);
    }
}
