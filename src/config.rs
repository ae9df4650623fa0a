//! Configuration — loads ~/.driftboard/config.yaml.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::asset::ClipSpec;
use crate::stream::GAIN_BASE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How the beat gain period is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BeatPeriod {
    /// Speech period plus up to `beat_jitter` seconds.
    #[default]
    Coupled,
    /// Drawn on its own from 15–30 seconds.
    Independent,
}

/// Gain modulation settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModulationConfig {
    /// Exponent base for gain curves.
    pub base: f64,
    pub speech_period_min: f64,
    pub speech_period_max: f64,
    pub beat_jitter: f64,
    pub beat_period: BeatPeriod,
    pub mute_speech: bool,
    pub mute_beats: bool,
}

impl Default for ModulationConfig {
    fn default() -> Self {
        Self {
            base: GAIN_BASE,
            speech_period_min: 30.0,
            speech_period_max: 60.0,
            beat_jitter: 15.0,
            beat_period: BeatPeriod::Coupled,
            mute_speech: false,
            mute_beats: false,
        }
    }
}

/// Soundboard configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// HTTP root that serves `<name>.wav` and `<name><n>.wav`.
    pub base_url: String,
    /// Local directory to load from instead of `base_url`.
    pub asset_dir: Option<PathBuf>,
    /// Clip names, in catalog order.
    pub clips: Vec<String>,
    /// Clips that have four beat variants.
    pub beat_clips: Vec<String>,
    /// Render block length in seconds.
    pub block_seconds: f64,
    /// Rendered blocks buffered ahead of the device.
    pub queue_blocks: usize,
    pub load_workers: usize,
    pub master_volume: f32,
    pub limiter_ceiling: f32,
    pub seed: Option<u64>,
    pub modulation: ModulationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            asset_dir: None,
            clips: Vec::new(),
            beat_clips: Vec::new(),
            block_seconds: 1.0 / 30.0,
            queue_blocks: 4,
            load_workers: 8,
            master_volume: 1.0,
            limiter_ceiling: 0.95,
            seed: None,
            modulation: ModulationConfig::default(),
        }
    }
}

/// Longest accepted render block, in seconds.
const MAX_BLOCK_SECONDS: f64 = 1.0;
/// Most rendered blocks allowed to queue ahead of the device.
const MAX_QUEUE_BLOCKS: usize = 64;

/// Finite and strictly greater than zero.
fn positive(x: f64) -> bool {
    x.is_finite() && x > 0.0
}

/// Default config file path.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".driftboard").join("config.yaml"))
}

impl Config {
    /// Load from `path`, or from the default path if none is given.
    ///
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match config_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        if !required && !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Check values that would make playback impossible.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.clips.is_empty() {
            return invalid("no clips configured".into());
        }
        if self.base_url.is_empty() && self.asset_dir.is_none() {
            return invalid("set base_url or asset_dir".into());
        }
        if let Some(name) = self.beat_clips.iter().find(|b| !self.clips.contains(*b)) {
            return invalid(format!("beat clip `{name}` is not in clips"));
        }
        if !positive(self.block_seconds) || self.block_seconds > MAX_BLOCK_SECONDS {
            return invalid(format!(
                "block_seconds {} outside (0, {MAX_BLOCK_SECONDS}]",
                self.block_seconds
            ));
        }
        if !(1..=MAX_QUEUE_BLOCKS).contains(&self.queue_blocks) {
            return invalid(format!(
                "queue_blocks {} outside 1..={MAX_QUEUE_BLOCKS}",
                self.queue_blocks
            ));
        }
        if !(0.0..=1.0).contains(&self.master_volume) {
            return invalid(format!(
                "master_volume {} outside 0..=1",
                self.master_volume
            ));
        }
        if !positive(self.limiter_ceiling.into()) || self.limiter_ceiling > 1.0 {
            return invalid(format!(
                "limiter_ceiling {} outside (0, 1]",
                self.limiter_ceiling
            ));
        }

        let m = &self.modulation;
        if !positive(m.speech_period_min)
            || !m.speech_period_max.is_finite()
            || m.speech_period_min >= m.speech_period_max
        {
            return invalid(format!(
                "speech period range [{}, {}) is empty or non-positive",
                m.speech_period_min, m.speech_period_max
            ));
        }
        if !positive(m.beat_jitter) {
            return invalid(format!(
                "beat_jitter must be positive, got {}",
                m.beat_jitter
            ));
        }
        if !positive(m.base) {
            return invalid(format!("base must be positive, got {}", m.base));
        }
        Ok(())
    }

    /// Clips to load, flagged with whether they have beats.
    pub fn clip_specs(&self) -> Vec<ClipSpec> {
        self.clips
            .iter()
            .map(|name| ClipSpec::new(name.clone(), self.beat_clips.contains(name)))
            .collect()
    }

    /// Block length in frames at `sample_rate`, never zero.
    pub fn block_frames(&self, sample_rate: u32) -> usize {
        ((self.block_seconds * sample_rate as f64).round() as usize).max(1)
    }
}
