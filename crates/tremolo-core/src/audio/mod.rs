//! Audio playback through the system output device.

pub mod decoder;
pub mod engine;
pub mod output;

pub use engine::{ AudioEngine, AudioSession };
