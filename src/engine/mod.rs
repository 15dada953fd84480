//! Generation orchestrator.
//!
//! This module provides the engine that coordinates the cloning model, the
//! transcription model and output files for both entry points.

mod naming;
mod tts;

pub use naming::{TimestampNamer, counter_filename};
pub use tts::{
    CloneEngine, GenerateError, GenerationRequest, GenerationResult, auto_transcribe,
};
