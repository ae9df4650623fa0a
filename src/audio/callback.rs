//! Audio callback — runs on the cpal audio thread.
//!
//! Drains rendered blocks from the ring buffer, copies them to the device
//! buffer, applies master volume and the limiter. Never blocks: when the
//! render loop falls behind, the gap is filled with silence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ringbuf::traits::Consumer;
use ringbuf::HeapCons;

use super::command::AudioCommand;
use super::limiter::Limiter;

/// Counters written by the audio thread and readable from any other.
#[derive(Debug, Default)]
pub struct OutputStats {
    underruns: AtomicU64,
    clipped: AtomicU64,
}

impl OutputStats {
    /// Device callbacks that ran out of rendered audio.
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    /// Samples the limiter had to clamp.
    pub fn clipped(&self) -> u64 {
        self.clipped.load(Ordering::Relaxed)
    }
}

/// State that lives on the audio thread. Accessed only from the cpal callback.
pub struct AudioCallback {
    consumer: HeapCons<AudioCommand>,
    /// Block currently being played out.
    current: Vec<f32>,
    read_pos: usize,
    volume: f32,
    limiter: Limiter,
    stats: Arc<OutputStats>,
}

impl AudioCallback {
    pub fn new(
        consumer: HeapCons<AudioCommand>,
        limiter: Limiter,
        stats: Arc<OutputStats>,
    ) -> Self {
        Self {
            consumer,
            current: Vec::new(),
            read_pos: 0,
            volume: 1.0,
            limiter,
            stats,
        }
    }

    /// Called by cpal whenever the device wants more samples.
    pub fn process(&mut self, output: &mut [f32]) {
        let mut written = 0;

        while written < output.len() {
            if self.read_pos == self.current.len() && !self.next_block() {
                break;
            }
            let available = self.current.len() - self.read_pos;
            let n = available.min(output.len() - written);
            for (out, &src) in output[written..written + n]
                .iter_mut()
                .zip(&self.current[self.read_pos..self.read_pos + n])
            {
                *out = src * self.volume;
            }
            self.read_pos += n;
            written += n;
        }

        if written < output.len() {
            self.stats.underruns.fetch_add(1, Ordering::Relaxed);
            output[written..].fill(0.0);
        }

        let clipped = self.limiter.process_block(output);
        if clipped > 0 {
            self.stats
                .clipped
                .fetch_add(clipped as u64, Ordering::Relaxed);
        }
    }

    /// Pop commands until a block arrives. Returns `false` if the ring is empty.
    fn next_block(&mut self) -> bool {
        while let Some(cmd) = self.consumer.try_pop() {
            match cmd {
                AudioCommand::Block(data) => {
                    self.current = data;
                    self.read_pos = 0;
                    if !self.current.is_empty() {
                        return true;
                    }
                }
                AudioCommand::SetVolume(v) => {
                    self.volume = v.clamp(0.0, 1.0);
                }
            }
        }
        false
    }
}
