//! Modulation periods and levels, fixed once at startup.

use rand::Rng;

use crate::config::{BeatPeriod, ModulationConfig};
use crate::stream::GAIN_BASE;

/// Independent beat periods are drawn from `[15, 30)` seconds.
const INDEPENDENT_BEAT_RANGE: std::ops::Range<f64> = 15.0..30.0;

/// Periods (seconds) of the speech and beat gain sinusoids.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Periods {
    pub speech: f64,
    pub beat: f64,
}

impl Periods {
    /// Draw both periods.
    ///
    /// The speech period is uniform in `[speech_period_min, speech_period_max)`.
    /// In [`BeatPeriod::Coupled`] mode the beat period is the speech period
    /// plus uniform `[0, beat_jitter)`, so it is never shorter than the
    /// speech period.
    pub fn draw<R: Rng>(rng: &mut R, config: &ModulationConfig) -> Self {
        let speech = rng.gen_range(config.speech_period_min..config.speech_period_max);
        let beat = match config.beat_period {
            BeatPeriod::Coupled => speech + rng.gen_range(0.0..config.beat_jitter),
            BeatPeriod::Independent => rng.gen_range(INDEPENDENT_BEAT_RANGE),
        };
        log::info!("gain periods: speech {speech:.1}s, beat {beat:.1}s");
        Self { speech, beat }
    }
}

/// Envelope settings shared by every clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Levels {
    pub base: f64,
    pub mute_speech: bool,
    pub mute_beats: bool,
}

impl Levels {
    pub fn from_config(config: &ModulationConfig) -> Self {
        Self {
            base: config.base,
            mute_speech: config.mute_speech,
            mute_beats: config.mute_beats,
        }
    }
}

impl Default for Levels {
    fn default() -> Self {
        Self {
            base: GAIN_BASE,
            mute_speech: false,
            mute_beats: false,
        }
    }
}
