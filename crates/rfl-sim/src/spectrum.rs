//! Spectrum sources feeding power readings into the run loop

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{Config, SourceKind, SpectrumConfig};

/// Anything that can produce one power reading per sensing interval
pub trait SpectrumSource: Send {
    fn name(&self) -> &str;

    fn num_channels(&self) -> usize;

    /// Next power reading, one dB value per channel
    fn next_reading(&mut self) -> Result<Vec<f64>>;
}

/// Build the source selected by `config.spectrum.source`
pub fn from_config(config: &Config) -> Result<Box<dyn SpectrumSource>> {
    let num_channels = config.agent.num_channels;
    match config.spectrum.source {
        SourceKind::Simulated => Ok(Box::new(SimulatedSpectrum::new(
            &config.spectrum,
            num_channels,
            config.run.seed,
        )?)),
        SourceKind::Replay => {
            let path = config
                .spectrum
                .replay_path
                .as_deref()
                .context("replay source selected without spectrum.replay_path")?;
            Ok(Box::new(ReplaySpectrum::open(path, num_channels)?))
        }
    }
}

struct ChannelModel {
    busy_probability: f64,
    busy: Normal<f64>,
}

/// Synthetic spectrum: each channel independently busy or idle per reading
pub struct SimulatedSpectrum {
    noise_floor_db: f64,
    idle: Normal<f64>,
    channels: Vec<ChannelModel>,
    rng: StdRng,
}

impl SimulatedSpectrum {
    pub fn new(config: &SpectrumConfig, num_channels: usize, seed: Option<u64>) -> Result<Self> {
        let idle = Normal::new(0.0, config.idle_std_db)
            .with_context(|| format!("invalid idle deviation {}", config.idle_std_db))?;

        let channels = (0..num_channels)
            .map(|channel| {
                let profile = config.profile(channel);
                let busy = Normal::new(profile.offset_db, profile.offset_std_db).with_context(|| {
                    format!("invalid busy distribution for channel {channel}")
                })?;
                Ok(ChannelModel {
                    busy_probability: profile.busy_probability,
                    busy,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            noise_floor_db: config.noise_floor_db,
            idle,
            channels,
            rng,
        })
    }
}

impl SpectrumSource for SimulatedSpectrum {
    fn name(&self) -> &str {
        "simulated"
    }

    fn num_channels(&self) -> usize {
        self.channels.len()
    }

    fn next_reading(&mut self) -> Result<Vec<f64>> {
        let reading = self
            .channels
            .iter()
            .map(|channel| {
                let offset = if self.rng.gen_bool(channel.busy_probability) {
                    channel.busy.sample(&mut self.rng)
                } else {
                    self.idle.sample(&mut self.rng)
                };
                self.noise_floor_db + offset
            })
            .collect();
        Ok(reading)
    }
}

/// One line of a replay file
#[derive(Deserialize)]
#[serde(untagged)]
enum ReplayLine {
    Bare(Vec<f64>),
    Exported { power_levels: Vec<f64> },
}

impl ReplayLine {
    fn into_powers(self) -> Vec<f64> {
        match self {
            Self::Bare(powers) | Self::Exported { power_levels: powers } => powers,
        }
    }
}

/// Recorded readings played back in order, wrapping at the end
#[derive(Debug)]
pub struct ReplaySpectrum {
    readings: Vec<Vec<f64>>,
    position: usize,
    num_channels: usize,
}

impl ReplaySpectrum {
    /// Read a JSON-lines trace; every line must carry `num_channels` powers
    pub fn open(path: &Path, num_channels: usize) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay file {}", path.display()))?;
        let source = Self::parse(&text, num_channels)
            .with_context(|| format!("Invalid replay file {}", path.display()))?;
        info!(
            "Loaded {} readings from {}",
            source.readings.len(),
            path.display()
        );
        Ok(source)
    }

    pub fn parse(text: &str, num_channels: usize) -> Result<Self> {
        let mut readings = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let powers = serde_json::from_str::<ReplayLine>(line)
                .with_context(|| format!("line {}: not a power reading", line_no + 1))?
                .into_powers();
            if powers.len() != num_channels {
                bail!(
                    "line {}: expected {} channels, found {}",
                    line_no + 1,
                    num_channels,
                    powers.len()
                );
            }
            readings.push(powers);
        }

        if readings.is_empty() {
            bail!("no readings");
        }

        Ok(Self {
            readings,
            position: 0,
            num_channels,
        })
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

impl SpectrumSource for ReplaySpectrum {
    fn name(&self) -> &str {
        "replay"
    }

    fn num_channels(&self) -> usize {
        self.num_channels
    }

    fn next_reading(&mut self) -> Result<Vec<f64>> {
        let reading = self.readings[self.position].clone();
        self.position += 1;
        if self.position == self.readings.len() {
            debug!("Replay wrapped after {} readings", self.readings.len());
            self.position = 0;
        }
        Ok(reading)
    }
}
