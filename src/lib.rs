//! spectro-rs - real-time audio feature extraction
//!
//! Frames captured on the audio thread are handed to a tick-driven analyzer
//! that turns them into spectra, a loudness envelope and multi-rate smoothed
//! magnitudes for a visualization layer to poll.

pub mod analysis;
pub mod audio;
pub mod settings;
