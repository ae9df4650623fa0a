//! Render loop side of the sink: pulls fixed-size blocks from the mixer.

use crate::stream::{Clock, Frame, Mixer, Stream, SILENCE};

/// Pulls one block at a time from the top-level [`Mixer`] and advances the
/// shared [`Clock`] by the block length once the block is rendered.
pub struct Renderer {
    mixer: Mixer,
    clock: Clock,
    block: Vec<Frame>,
    errors: u64,
}

impl Renderer {
    pub fn new(mixer: Mixer, clock: Clock, block_frames: usize) -> Self {
        Self {
            mixer,
            clock,
            block: vec![SILENCE; block_frames.max(1)],
            errors: 0,
        }
    }

    /// Block length in frames.
    pub fn block_frames(&self) -> usize {
        self.block.len()
    }

    /// Render the next block as interleaved stereo samples.
    ///
    /// A stream error is logged; the block still carries every healthy stream.
    pub fn render_block(&mut self) -> Vec<f32> {
        if let Err(err) = self.mixer.stream(&mut self.block) {
            self.errors += 1;
            log::warn!("render: {err}");
        }
        self.clock.advance(self.block.len());
        self.block.iter().flat_map(|frame| *frame).collect()
    }

    /// Active streams in the mixer.
    pub fn active(&self) -> usize {
        self.mixer.len()
    }

    /// Stream errors seen so far.
    pub fn errors(&self) -> u64 {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use crate::stream::{Pulled, StreamError};
    use std::sync::Arc;

    struct Failing;

    impl Stream for Failing {
        fn stream(&mut self, _buf: &mut [Frame]) -> Result<Pulled, StreamError> {
            Err(StreamError::new("failing", "boom"))
        }
    }

    #[test]
    fn renders_interleaved_blocks() {
        let mixer = Mixer::new();
        let asset = Arc::new(Asset::from_frames(vec![[0.25, -0.25]; 3], 1000, 2));
        mixer.handle().add(vec![Box::new(asset.streamer())]);
        let mut renderer = Renderer::new(mixer, Clock::new(1000), 4);

        let block = renderer.render_block();
        assert_eq!(block, vec![0.25, -0.25, 0.25, -0.25, 0.25, -0.25, 0.0, 0.0]);
        assert_eq!(renderer.active(), 0);
    }

    #[test]
    fn advances_clock_per_block() {
        let clock = Clock::new(1000);
        let mut renderer = Renderer::new(Mixer::new(), clock.clone(), 100);
        for _ in 0..5 {
            renderer.render_block();
        }
        assert_eq!(clock.elapsed_frames(), 500);
        assert!((clock.now() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn counts_stream_errors() {
        let mut mixer = Mixer::new();
        mixer.add(vec![Box::new(Failing)]);
        let mut renderer = Renderer::new(mixer, Clock::new(1000), 4);

        let block = renderer.render_block();
        assert_eq!(block, vec![0.0; 8]);
        assert_eq!(renderer.errors(), 1);
        assert_eq!(renderer.active(), 0);
    }

    #[test]
    fn zero_length_block_renders_one_frame() {
        let mut renderer = Renderer::new(Mixer::new(), Clock::new(1000), 0);
        assert_eq!(renderer.block_frames(), 1);
        assert_eq!(renderer.render_block().len(), 2);
    }
}
