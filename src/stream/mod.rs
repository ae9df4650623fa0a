//! Sample streams — the pull-based composition layer.
//!
//! Every audio source in the soundboard is a [`Stream`]: a finite (or endless)
//! sequence of stereo [`Frame`]s pulled one block at a time. Decoded assets are
//! read through a [`Seeker`], rescaled by an [`Envelope`], tagged with an
//! [`OnEnd`] completion hook and summed by the [`Mixer`].

pub mod clock;
pub mod envelope;
pub mod mixer;
pub mod notify;

use std::sync::Arc;

use thiserror::Error;

use crate::asset::Asset;

pub use clock::Clock;
pub use envelope::{Envelope, GainCurve, GAIN_BASE};
pub use mixer::{Mixer, MixerHandle};
pub use notify::OnEnd;

/// One stereo frame: left and right amplitude, nominally in `[-1, 1]`.
pub type Frame = [f32; 2];

/// A silent frame.
pub const SILENCE: Frame = [0.0, 0.0];

/// Result of a single pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulled {
    /// Number of frames written to the front of the buffer.
    pub frames: usize,
    /// `false` once the stream is exhausted; stays `false` on every later pull.
    pub more: bool,
}

impl Pulled {
    pub fn new(frames: usize, more: bool) -> Self {
        Self { frames, more }
    }
}

/// An error reported by a stream during playback.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("stream `{origin}` failed: {message}")]
pub struct StreamError {
    pub origin: String,
    pub message: String,
}

impl StreamError {
    pub fn new(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            message: message.into(),
        }
    }
}

/// A pull-based source of stereo frames.
pub trait Stream: Send {
    /// Fill the front of `buf` with up to `buf.len()` frames.
    ///
    /// Fewer frames than requested are returned only at end of data.
    fn stream(&mut self, buf: &mut [Frame]) -> Result<Pulled, StreamError>;
}

impl<S: Stream + ?Sized> Stream for Box<S> {
    fn stream(&mut self, buf: &mut [Frame]) -> Result<Pulled, StreamError> {
        (**self).stream(buf)
    }
}

/// A read cursor over a shared, immutable [`Asset`].
///
/// The cursor only moves forward. A fresh seeker (see [`Asset::streamer`])
/// always starts at frame 0; the asset itself is never consumed.
#[derive(Debug, Clone)]
pub struct Seeker {
    asset: Arc<Asset>,
    position: usize,
}

impl Seeker {
    pub fn new(asset: Arc<Asset>) -> Self {
        Self { asset, position: 0 }
    }

    /// Current cursor position in frames.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Total length of the underlying asset in frames.
    pub fn len(&self) -> usize {
        self.asset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.asset.is_empty()
    }

    /// Frames left before exhaustion.
    pub fn remaining(&self) -> usize {
        self.asset.len() - self.position
    }
}

impl Stream for Seeker {
    fn stream(&mut self, buf: &mut [Frame]) -> Result<Pulled, StreamError> {
        let frames = self.asset.frames();
        let n = buf.len().min(frames.len() - self.position);
        buf[..n].copy_from_slice(&frames[self.position..self.position + n]);
        self.position += n;
        Ok(Pulled::new(n, self.position < frames.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Arc<Asset> {
        let frames = (0..len).map(|i| [i as f32, -(i as f32)]).collect();
        Arc::new(Asset::from_frames(frames, 44100, 2))
    }

    #[test]
    fn seeker_yields_every_frame_once() {
        let asset = ramp(10);
        let mut seeker = asset.streamer();
        let mut buf = [SILENCE; 4];
        let mut seen = Vec::new();

        loop {
            let pulled = seeker.stream(&mut buf).unwrap();
            seen.extend_from_slice(&buf[..pulled.frames]);
            if !pulled.more {
                break;
            }
        }

        assert_eq!(seen.len(), 10);
        assert_eq!(seen, asset.frames());
    }

    #[test]
    fn seeker_reports_end_exactly_at_last_frame() {
        let asset = ramp(8);
        let mut seeker = asset.streamer();
        let mut buf = [SILENCE; 4];

        assert_eq!(seeker.stream(&mut buf).unwrap(), Pulled::new(4, true));
        assert_eq!(seeker.stream(&mut buf).unwrap(), Pulled::new(4, false));
        assert_eq!(seeker.remaining(), 0);
    }

    #[test]
    fn exhausted_seeker_stays_exhausted() {
        let asset = ramp(3);
        let mut seeker = asset.streamer();
        let mut buf = [SILENCE; 8];

        assert_eq!(seeker.stream(&mut buf).unwrap(), Pulled::new(3, false));
        for _ in 0..5 {
            assert_eq!(seeker.stream(&mut buf).unwrap(), Pulled::new(0, false));
        }
    }

    #[test]
    fn new_seeker_restarts_at_zero() {
        let asset = ramp(6);
        let mut first = asset.streamer();
        let mut buf = [SILENCE; 6];
        first.stream(&mut buf).unwrap();

        let mut second = asset.streamer();
        assert_eq!(second.position(), 0);
        let mut buf2 = [SILENCE; 2];
        second.stream(&mut buf2).unwrap();
        assert_eq!(buf2, [[0.0, -0.0], [1.0, -1.0]]);
    }

    #[test]
    fn seekers_do_not_interfere() {
        let asset = ramp(4);
        let mut a = asset.streamer();
        let mut b = asset.streamer();
        let mut buf = [SILENCE; 3];

        a.stream(&mut buf).unwrap();
        assert_eq!(a.position(), 3);
        assert_eq!(b.position(), 0);
        b.stream(&mut buf[..1]).unwrap();
        assert_eq!(buf[0], [0.0, -0.0]);
    }

    #[test]
    fn boxed_stream_delegates() {
        let mut boxed: Box<dyn Stream> = Box::new(ramp(2).streamer());
        let mut buf = [SILENCE; 4];
        assert_eq!(boxed.stream(&mut buf).unwrap(), Pulled::new(2, false));
    }

    #[test]
    fn stream_error_display() {
        let err = StreamError::new("beat", "device gone");
        assert_eq!(err.to_string(), "stream `beat` failed: device gone");
    }
}
