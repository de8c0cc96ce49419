//! Configuration loading for the RFL driver

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

use rfl_core::AgentConfig;

/// Configuration for the driver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub run: RunConfig,
    pub spectrum: SpectrumConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Stop after this many episodes (0 = no limit)
    pub max_episodes: u64,
    /// Stop after this many seconds of wall-clock time (0 = no limit)
    pub max_duration_seconds: u64,
    pub sensing_interval_ms: u64,
    /// Print the comparison table every N episodes (0 = only at the end)
    pub report_interval: u64,
    pub snapshot_path: PathBuf,
    pub load_snapshot: bool,
    pub save_snapshot: bool,
    pub report_path: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_episodes: 1000,
            max_duration_seconds: 100,
            sensing_interval_ms: 100,
            report_interval: 100,
            snapshot_path: PathBuf::from("q_table.json"),
            load_snapshot: false,
            save_snapshot: true,
            report_path: None,
            seed: None,
        }
    }
}

/// Where power readings come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Simulated,
    Replay,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulated => write!(f, "simulated"),
            Self::Replay => write!(f, "replay"),
        }
    }
}

/// Occupancy behaviour of one simulated channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelProfile {
    pub busy_probability: f64,
    /// Mean power above the noise floor while busy (dB)
    pub offset_db: f64,
    pub offset_std_db: f64,
}

impl Default for ChannelProfile {
    fn default() -> Self {
        Self {
            busy_probability: 0.3,
            offset_db: 20.0,
            offset_std_db: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    pub source: SourceKind,
    pub noise_floor_db: f64,
    /// Standard deviation of idle-channel power around the floor
    pub idle_std_db: f64,
    pub default_profile: ChannelProfile,
    /// Per-channel overrides; channels past the end use `default_profile`
    pub channels: Vec<ChannelProfile>,
    pub replay_path: Option<PathBuf>,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Simulated,
            noise_floor_db: -70.0,
            idle_std_db: 2.0,
            default_profile: ChannelProfile::default(),
            channels: Vec::new(),
            replay_path: None,
        }
    }
}

impl SpectrumConfig {
    /// Profile for `channel`, falling back to the default
    pub fn profile(&self, channel: usize) -> ChannelProfile {
        self.channels
            .get(channel)
            .copied()
            .unwrap_or(self.default_profile)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// Also log to this file when set
    pub file: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: String::new(),
        }
    }
}

/// Command-line values that take precedence over file and environment
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub episodes: Option<u64>,
    pub time: Option<u64>,
    pub load_snapshot: bool,
    pub snapshot: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub seed: Option<u64>,
    pub source: Option<SourceKind>,
    pub replay_file: Option<PathBuf>,
    pub verbose: bool,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Logs nothing, so it is safe to call before tracing is set up. Call
    /// `validate` once command-line overrides are applied.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::build(Self::locate(path)?.as_deref(), None)
    }

    /// Resolve which file `load` reads.
    ///
    /// An explicit `path` must exist; otherwise the usual locations are
    /// searched and `None` means defaults.
    pub fn locate(path: Option<&Path>) -> Result<Option<PathBuf>> {
        match path {
            Some(path) if path.exists() => Ok(Some(path.to_path_buf())),
            Some(path) => bail!("Config file not found: {}", path.display()),
            None => Ok(Self::find_config_file()),
        }
    }

    /// Layer defaults, an optional TOML file and `RFL__*` variables.
    ///
    /// `env` replaces the process environment when given.
    pub fn build(
        file: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let mut builder = ConfigBuilder::<config::builder::DefaultState>::default();

        if let Some(path) = file {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("RFL")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config = builder.build().context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Find the configuration file
    fn find_config_file() -> Option<PathBuf> {
        // Check in order: RFL_CONFIG env, ./rfl.toml, ~/.config/rfl/rfl.toml
        if let Ok(path) = std::env::var("RFL_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local = PathBuf::from("rfl.toml");
        if local.exists() {
            return Some(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".config").join("rfl").join("rfl.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply(&mut self, overrides: &RunOverrides) {
        if let Some(episodes) = overrides.episodes {
            self.run.max_episodes = episodes;
        }
        if let Some(time) = overrides.time {
            self.run.max_duration_seconds = time;
        }
        if overrides.load_snapshot {
            self.run.load_snapshot = true;
        }
        if let Some(path) = &overrides.snapshot {
            self.run.snapshot_path = path.clone();
        }
        if let Some(path) = &overrides.report {
            self.run.report_path = Some(path.clone());
        }
        if overrides.seed.is_some() {
            self.run.seed = overrides.seed;
        }
        if let Some(path) = &overrides.replay_file {
            self.spectrum.replay_path = Some(path.clone());
            self.spectrum.source = SourceKind::Replay;
        }
        if let Some(source) = overrides.source {
            self.spectrum.source = source;
        }
        if overrides.verbose {
            self.log.level = "debug".to_string();
        }
    }

    /// Check everything a run depends on before it starts
    pub fn validate(&self) -> Result<()> {
        self.agent.validate()?;

        if self.spectrum.source == SourceKind::Replay && self.spectrum.replay_path.is_none() {
            bail!("spectrum.source = \"replay\" requires spectrum.replay_path");
        }
        if !self.spectrum.noise_floor_db.is_finite() {
            bail!("spectrum.noise_floor_db must be finite");
        }
        if !(self.spectrum.idle_std_db.is_finite() && self.spectrum.idle_std_db >= 0.0) {
            bail!(
                "spectrum.idle_std_db must be a non-negative number, got {}",
                self.spectrum.idle_std_db
            );
        }
        let profiles = std::iter::once(&self.spectrum.default_profile).chain(&self.spectrum.channels);
        for (i, profile) in profiles.enumerate() {
            let name = if i == 0 {
                "default_profile".to_string()
            } else {
                format!("channels[{}]", i - 1)
            };
            if !(0.0..=1.0).contains(&profile.busy_probability) {
                bail!(
                    "spectrum.{name}.busy_probability must be within [0, 1], got {}",
                    profile.busy_probability
                );
            }
            if !profile.offset_db.is_finite()
                || !(profile.offset_std_db.is_finite() && profile.offset_std_db >= 0.0)
            {
                bail!("spectrum.{name} offsets must be finite with a non-negative deviation");
            }
        }
        Ok(())
    }

    /// Render as TOML, the same shape `load` reads
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.agent.num_channels, 5);
        assert_eq!(config.run.max_episodes, 1000);
        assert_eq!(config.run.max_duration_seconds, 100);
        assert_eq!(config.run.sensing_interval_ms, 100);
        assert_eq!(config.run.snapshot_path, PathBuf::from("q_table.json"));
        assert!(!config.run.load_snapshot);
        assert!(config.run.save_snapshot);
        assert_eq!(config.spectrum.source, SourceKind::Simulated);
        assert_eq!(config.spectrum.noise_floor_db, -70.0);
        assert_eq!(config.log.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_locate_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rfl.toml");
        std::fs::write(&path, "[run]\nmax_episodes = 7\n").unwrap();

        assert_eq!(Config::locate(Some(&path)).unwrap(), Some(path.clone()));
        assert_eq!(Config::load(Some(&path)).unwrap().run.max_episodes, 7);

        let missing = dir.path().join("absent.toml");
        let err = Config::locate(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_profile_fallback() {
        let mut spectrum = SpectrumConfig::default();
        spectrum.channels.push(ChannelProfile {
            busy_probability: 0.9,
            ..ChannelProfile::default()
        });
        assert_eq!(spectrum.profile(0).busy_probability, 0.9);
        assert_eq!(spectrum.profile(4).busy_probability, 0.3);
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply(&RunOverrides {
            episodes: Some(50),
            time: Some(0),
            load_snapshot: true,
            seed: Some(7),
            replay_file: Some(PathBuf::from("trace.jsonl")),
            verbose: true,
            ..RunOverrides::default()
        });

        assert_eq!(config.run.max_episodes, 50);
        assert_eq!(config.run.max_duration_seconds, 0);
        assert!(config.run.load_snapshot);
        assert_eq!(config.run.seed, Some(7));
        assert_eq!(config.spectrum.source, SourceKind::Replay);
        assert_eq!(config.log.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_replay_requires_path() {
        let mut config = Config::default();
        config.spectrum.source = SourceKind::Replay;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_profile_rejected() {
        let mut config = Config::default();
        config.spectrum.channels.push(ChannelProfile {
            busy_probability: 1.5,
            ..ChannelProfile::default()
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("channels[0]"));
    }

    #[test]
    fn test_invalid_agent_rejected() {
        let mut config = Config::default();
        config.agent.learning_rate = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = Config::default();
        config.run.seed = Some(3);
        let text = config.to_toml().unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
