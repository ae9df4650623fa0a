//! Driftboard — a generative soundboard.
//!
//! Random spoken-word clips play over random beat loops, each stream's gain
//! following its own slow sinusoid in exponent space.

pub mod asset;
pub mod audio;
pub mod config;
pub mod schedule;
pub mod stream;
