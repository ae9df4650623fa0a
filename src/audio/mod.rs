//! Audio output — cpal device stream fed through a lock-free queue.
//!
//! The [`Renderer`] pulls fixed-size blocks from the top-level mixer on the
//! render thread; the [`AudioEngine`] pushes them as [`AudioCommand`]s into a
//! small ring buffer that the cpal callback drains. The ring's capacity bounds
//! how far rendering (and therefore the shared clock) can run ahead of the
//! speakers.

pub mod callback;
pub mod command;
pub mod limiter;
pub mod render;

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{
    traits::{Observer, Producer, Split},
    HeapRb,
};
use thiserror::Error;

pub use callback::OutputStats;
pub use command::AudioCommand;
pub use limiter::Limiter;
pub use render::Renderer;

use callback::AudioCallback;

/// Output is always interleaved stereo.
pub const CHANNELS: u16 = 2;

/// Audio engine errors.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device found")]
    NoOutputDevice,
    #[error("stream build error: {0}")]
    StreamBuild(String),
    #[error("stream play error: {0}")]
    StreamPlay(String),
    /// The device is not draining fast enough.
    #[error("audio command ring buffer is full")]
    BufferFull,
}

/// The audio engine. Owns the cpal stream and ring buffer producer.
pub struct AudioEngine {
    _stream: cpal::Stream,
    producer: ringbuf::HeapProd<AudioCommand>,
    stats: Arc<OutputStats>,
    sample_rate: u32,
}

impl AudioEngine {
    /// Open the default output device at `sample_rate`, stereo.
    ///
    /// `queue_blocks` is the number of rendered blocks that may wait ahead
    /// of the device.
    pub fn new(
        sample_rate: u32,
        queue_blocks: usize,
        limiter: Limiter,
    ) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;

        // One extra slot so a volume change never displaces a block.
        let rb = HeapRb::<AudioCommand>::new(queue_blocks.max(1) + 1);
        let (producer, consumer) = rb.split();

        let stats = Arc::new(OutputStats::default());
        let mut audio_callback = AudioCallback::new(consumer, limiter, Arc::clone(&stats));

        let stream_config = cpal::StreamConfig {
            channels: CHANNELS,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_fn = |err: cpal::StreamError| {
            log::error!("audio stream error: {err}");
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    audio_callback.process(data);
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;

        log::info!("audio output: {sample_rate} Hz, {CHANNELS} ch");
        Ok(Self {
            _stream: stream,
            producer,
            stats,
            sample_rate,
        })
    }

    /// Whether another block fits in the queue.
    pub fn has_room(&self) -> bool {
        self.producer.vacant_len() > 1
    }

    /// Queue one rendered block of interleaved stereo samples.
    pub fn send_block(&mut self, samples: Vec<f32>) -> Result<(), AudioError> {
        self.producer
            .try_push(AudioCommand::Block(samples))
            .map_err(|_| AudioError::BufferFull)
    }

    /// Set master volume (clamped to 0.0..=1.0 on the audio thread).
    pub fn set_volume(&mut self, volume: f32) -> Result<(), AudioError> {
        self.producer
            .try_push(AudioCommand::SetVolume(volume))
            .map_err(|_| AudioError::BufferFull)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Device callbacks that found no rendered block waiting.
    pub fn underruns(&self) -> u64 {
        self.stats.underruns()
    }

    /// Samples clamped by the limiter so far.
    pub fn clipped(&self) -> u64 {
        self.stats.clipped()
    }
}
