//! Reference voice handling: upload storage and prepared reference audio.

mod manager;

pub use manager::{ReferenceAudio, UploadError, UploadStore};
