//! Assets — decoded PCM buffers, their transport, and the clip catalog.

pub mod catalog;
pub mod fetch;

use std::io::Cursor;
use std::sync::Arc;

use thiserror::Error;

use crate::stream::{Frame, Seeker};

pub use catalog::{load, BeatSet, Catalog, CatalogBuilder, ClipSpec, LoadError, BEAT_VARIANTS};
pub use fetch::{DirFetcher, Fetch, FetchError, HttpFetcher};

/// Errors that can occur when decoding a WAV payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// WAV decoding or I/O error.
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    /// The WAV file contains no samples.
    #[error("WAV file contains no samples")]
    Empty,
    /// Unsupported channel layout or format.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// An immutable decoded audio buffer of stereo frames.
///
/// Shared behind an `Arc`; any number of [`Seeker`]s may read it at once.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    frames: Vec<Frame>,
    sample_rate: u32,
    channels: u16,
}

impl Asset {
    /// Create from stereo frames. `channels` records the source layout.
    pub fn from_frames(frames: Vec<Frame>, sample_rate: u32, channels: u16) -> Self {
        Self {
            frames,
            sample_rate,
            channels,
        }
    }

    /// Decode a WAV payload held in memory.
    ///
    /// Integer formats of any bit depth and 32-bit float are accepted. Mono is
    /// duplicated to both channels; more than two channels is rejected.
    pub fn from_wav(bytes: &[u8]) -> Result<Self, DecodeError> {
        let wav = hound::WavReader::new(Cursor::new(bytes))?;
        let spec = wav.spec();
        let channels = spec.channels as usize;

        if channels == 0 || channels > 2 {
            return Err(DecodeError::UnsupportedFormat(format!(
                "{channels} channels"
            )));
        }

        let raw_samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Int => {
                let bits = spec.bits_per_sample;
                if bits == 0 || bits > 32 {
                    return Err(DecodeError::UnsupportedFormat(format!("{bits}-bit integer")));
                }
                let max_val = (1u64 << (bits - 1)) as f32;
                wav.into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max_val))
                    .collect::<Result<Vec<f32>, _>>()?
            }
            hound::SampleFormat::Float => {
                wav.into_samples::<f32>().collect::<Result<Vec<f32>, _>>()?
            }
        };

        if raw_samples.is_empty() {
            return Err(DecodeError::Empty);
        }

        let frames = raw_samples
            .chunks_exact(channels)
            .map(|frame| [frame[0], frame[channels - 1]])
            .collect();

        Ok(Self {
            frames,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        })
    }

    /// A fresh cursor over the whole asset, starting at frame 0.
    pub fn streamer(self: &Arc<Self>) -> Seeker {
        Seeker::new(Arc::clone(self))
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Length in frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count of the source payload.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Playback duration in seconds.
    pub fn duration(&self) -> f64 {
        self.frames.len() as f64 / self.sample_rate as f64
    }
}
