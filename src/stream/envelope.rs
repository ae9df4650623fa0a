//! Time-varying gain wrapper.
//!
//! An [`Envelope`] pulls a block from its child, evaluates its gain function
//! once against the shared [`Clock`], and scales every sample in the block by
//! `base ^ exponent`. The gain function returns an exponent, not a multiplier.

use std::f64::consts::TAU;

use super::{Clock, Frame, Pulled, Stream, StreamError};

/// Default exponent base: each unit of exponent doubles or halves amplitude.
pub const GAIN_BASE: f64 = 2.0;

/// A slow cosine in exponent space: `offset + depth * cos(2π t / period)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainCurve {
    pub offset: f64,
    pub depth: f64,
    /// Period in seconds.
    pub period: f64,
}

impl GainCurve {
    /// Speech curve, exponent range `[-3, 2]`.
    pub fn speech(period: f64) -> Self {
        Self {
            offset: -0.5,
            depth: 2.5,
            period,
        }
    }

    /// Beat curve, exponent range `[-6, 0]`. Starts at its quietest.
    pub fn beat(period: f64) -> Self {
        Self {
            offset: -3.0,
            depth: -3.0,
            period,
        }
    }

    /// Exponent at absolute time `t` (seconds).
    pub fn exponent(&self, t: f64) -> f64 {
        self.offset + self.depth * (TAU * t / self.period).cos()
    }
}

type GainFn = Box<dyn Fn(f64) -> f64 + Send>;

/// Rescales a child stream by `base ^ gain_fn(now)`, constant over each block.
pub struct Envelope<S> {
    child: S,
    gain_fn: GainFn,
    clock: Clock,
    base: f64,
    silent: bool,
}

impl<S: Stream> Envelope<S> {
    pub fn new(child: S, clock: Clock, gain_fn: impl Fn(f64) -> f64 + Send + 'static) -> Self {
        Self {
            child,
            gain_fn: Box::new(gain_fn),
            clock,
            base: GAIN_BASE,
            silent: false,
        }
    }

    /// Wrap `child` with a [`GainCurve`].
    pub fn with_curve(child: S, clock: Clock, curve: GainCurve) -> Self {
        Self::new(child, clock, move |t| curve.exponent(t))
    }

    pub fn base(mut self, base: f64) -> Self {
        self.base = base;
        self
    }

    /// A silent envelope emits zero amplitude regardless of its gain function.
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Gain multiplier at the clock's current instant.
    pub fn gain(&self) -> f64 {
        if self.silent {
            0.0
        } else {
            self.base.powf((self.gain_fn)(self.clock.now()))
        }
    }
}

impl<S: Stream> Stream for Envelope<S> {
    fn stream(&mut self, buf: &mut [Frame]) -> Result<Pulled, StreamError> {
        let pulled = self.child.stream(buf)?;
        let gain = self.gain() as f32;
        for frame in &mut buf[..pulled.frames] {
            frame[0] *= gain;
            frame[1] *= gain;
        }
        Ok(pulled)
    }
}
