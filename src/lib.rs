//! voice-studio: zero-shot voice cloning studio.
//!
//! Clone a voice from a short reference recording and its transcript, then
//! speak arbitrary text with it. Two front ends share the same pipeline: a
//! web service (upload, auto-transcribe, generate) and an interactive
//! console that turns each typed line into a WAV file.

pub mod audio;
pub mod backend;
pub mod cli;
pub mod console;
pub mod engine;
pub mod server;
pub mod voice;
