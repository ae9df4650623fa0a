//! Commands sent from the render loop to the audio thread via ring buffer.

/// Commands sent from the render loop to the audio thread via ring buffer.
#[derive(Debug)]
pub enum AudioCommand {
    /// One rendered block of interleaved stereo samples (L, R, L, R, ...).
    Block(Vec<f32>),

    /// Set master volume (0.0 to 1.0).
    SetVolume(f32),
}
