//! Master limiter — hard clamp on the device output.
//!
//! The mixer sums without clipping, so this is the only place overshoot is
//! caught before it reaches the speakers.

/// Hard limiter that clamps samples to `[-ceiling, ceiling]`.
#[derive(Debug, Clone)]
pub struct Limiter {
    ceiling: f32,
}

impl Limiter {
    /// Ceilings outside `(0.0, 1.0]` are pulled back to full scale.
    pub fn new(ceiling: f32) -> Self {
        let ceiling = if ceiling > 0.0 && ceiling <= 1.0 { ceiling } else { 1.0 };
        Self { ceiling }
    }

    /// Clamp a buffer in place, returning how many samples were over the ceiling.
    #[inline]
    pub fn process_block(&self, buffer: &mut [f32]) -> usize {
        let mut clipped = 0;
        for sample in buffer.iter_mut() {
            if sample.abs() > self.ceiling {
                *sample = sample.clamp(-self.ceiling, self.ceiling);
                clipped += 1;
            }
        }
        clipped
    }

    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }
}

impl Default for Limiter {
    fn default() -> Self {
        Self { ceiling: 0.95 }
    }
}
