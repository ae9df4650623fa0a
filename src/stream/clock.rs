//! Shared playback clock.
//!
//! Time is counted in rendered frames, so every envelope evaluated during one
//! mixer pull observes the same instant. Only the renderer advances it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic elapsed time since playback start.
#[derive(Debug, Clone)]
pub struct Clock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl Clock {
    pub fn new(sample_rate: u32) -> Self {
        debug_assert!(sample_rate > 0);
        Self {
            frames: Arc::new(AtomicU64::new(0)),
            sample_rate,
        }
    }

    /// Advance by `frames` rendered frames. Never rewinds.
    pub fn advance(&self, frames: usize) {
        self.frames.fetch_add(frames as u64, Ordering::AcqRel);
    }

    /// Frames rendered so far.
    pub fn elapsed_frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Elapsed time in seconds.
    pub fn now(&self) -> f64 {
        self.elapsed_frames() as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn starts_at_zero() {
        let clock = Clock::new(48000);
        assert_eq!(clock.elapsed_frames(), 0);
        assert_eq!(clock.now(), 0.0);
    }

    #[test]
    fn advance_accumulates() {
        let clock = Clock::new(44100);
        clock.advance(44100);
        clock.advance(22050);
        assert_eq!(clock.elapsed_frames(), 66150);
        assert_approx_eq!(clock.now(), 1.5);
    }

    #[test]
    fn clones_share_time() {
        let clock = Clock::new(1000);
        let reader = clock.clone();
        clock.advance(250);
        assert_approx_eq!(reader.now(), 0.25);
    }
}
