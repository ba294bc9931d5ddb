//! Audio module - producer side of the pipeline
//!
//! This module provides:
//! - Lock-free frame hand-off from the audio callback to the tick thread
//! - Audio input capture and frame assembly

mod input;
pub mod slot;

pub use input::{list_input_devices, AudioInput, DeviceError, FrameAssembler, InputDeviceInfo};
pub use slot::{FrameRead, FrameSink, FrameSource, Ingestion, IngestStats};
