//! CLI argument definitions and parsing.

use std::fmt;
use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reference recording used by the console tool when none is given.
pub const DEFAULT_REFERENCE_AUDIO: &str = "sample_reference.wav";

/// Transcript of [`DEFAULT_REFERENCE_AUDIO`]; replace it with the sentence
/// actually spoken in your recording.
pub const DEFAULT_REFERENCE_TEXT: &str =
    "이 파일에서 실제로 말하고 있는 문장을 정확하게 여기에 적어주세요.";

/// Voice cloning text-to-speech studio.
#[derive(Parser, Debug)]
#[command(name = "voice-studio")]
#[command(about = "Voice cloning text-to-speech: web studio and interactive console")]
#[command(version)]
pub struct Args {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Compute device for the cloning model (auto-detected when omitted)
    #[arg(long, value_enum, global = true, env = "VOICE_STUDIO_DEVICE")]
    pub device: Option<Device>,

    /// Voice cloning model server URL
    #[arg(
        long,
        global = true,
        env = "VOICE_STUDIO_TTS_URL",
        default_value = "http://localhost:9290"
    )]
    pub tts_url: String,

    /// Directory holding the cloning model weights, as seen by the model server
    #[arg(long, global = true, env = "VOICE_STUDIO_MODEL_DIR", default_value = ".")]
    pub model_dir: String,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    /// Device to load the model on: the explicit choice or the detected one.
    pub fn resolved_device(&self) -> Device {
        self.device.unwrap_or_else(Device::detect)
    }
}

/// Entry points sharing the same generation pipeline.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the web studio (upload, transcribe, generate)
    Serve(ServeArgs),

    /// Interactive console loop generating one file per typed line
    Console(ConsoleArgs),
}

/// Web service options.
#[derive(ClapArgs, Debug, Clone)]
pub struct ServeArgs {
    /// Host to bind
    #[arg(long, env = "VOICE_STUDIO_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "VOICE_STUDIO_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Transcription server URL (OpenAI-compatible)
    #[arg(long, env = "VOICE_STUDIO_STT_URL", default_value = "http://localhost:9300")]
    pub stt_url: String,

    /// Transcription model name
    #[arg(long, env = "VOICE_STUDIO_STT_MODEL", default_value = "whisper-tiny")]
    pub stt_model: String,

    /// Language of uploaded reference recordings (ISO-639-1)
    #[arg(long, env = "VOICE_STUDIO_STT_LANGUAGE", default_value = "ko")]
    pub stt_language: String,

    /// Skip loading the transcription model
    #[arg(long)]
    pub no_transcribe: bool,

    /// Directory with the web UI assets
    #[arg(long, default_value = "static")]
    pub static_dir: PathBuf,

    /// Directory for uploads and their cached conversions
    #[arg(long, default_value = "uploads")]
    pub uploads_dir: PathBuf,

    /// Directory for generated audio
    #[arg(long, default_value = "generations")]
    pub generations_dir: PathBuf,

    /// Maximum upload size in MiB
    #[arg(long, default_value_t = 50)]
    pub max_upload_mb: usize,
}

/// Console tool options.
#[derive(ClapArgs, Debug, Clone)]
pub struct ConsoleArgs {
    /// Reference audio (.wav is used as-is, other formats are converted)
    #[arg(short, long, default_value = DEFAULT_REFERENCE_AUDIO)]
    pub reference: PathBuf,

    /// Transcript of the reference audio
    #[arg(short, long, default_value = DEFAULT_REFERENCE_TEXT)]
    pub transcript: String,

    /// Directory receiving output_<N>.wav files
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,
}

/// Compute device selection.
#[derive(ValueEnum, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Apple Metal Performance Shaders
    #[value(name = "mps")]
    Mps,

    /// NVIDIA CUDA
    #[value(name = "cuda")]
    Cuda,

    /// General-purpose CPU
    #[value(name = "cpu")]
    Cpu,
}

impl Device {
    /// Static device choice: Metal on Apple silicon, CPU elsewhere.
    pub fn detect() -> Self {
        if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
            Device::Mps
        } else {
            Device::Cpu
        }
    }

    /// Returns the device string understood by the model server.
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Mps => "mps",
            Device::Cuda => "cuda",
            Device::Cpu => "cpu",
        }
    }

    /// Whether cached device memory should be released after each generation.
    pub fn needs_cache_release(&self) -> bool {
        matches!(self, Device::Mps | Device::Cuda)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference audio with transcript for the console tool.
#[derive(Debug, Clone)]
pub struct Reference {
    /// Path to the audio file.
    pub audio_path: PathBuf,
    /// Transcript of the audio content.
    pub transcript: String,
}

/// Errors that can occur when validating a reference.
#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("Reference audio file '{0}' not found")]
    FileNotFound(PathBuf),

    #[error("Transcript cannot be empty")]
    EmptyTranscript,
}

impl Reference {
    /// Build a reference, checking the audio exists and the transcript is set.
    ///
    /// # Examples
    /// ```no_run
    /// use voice_studio::cli::Reference;
    /// let reference = Reference::new("sample_reference.wav", "Hello world");
    /// ```
    pub fn new(
        audio_path: impl Into<PathBuf>,
        transcript: &str,
    ) -> Result<Self, ReferenceError> {
        let audio_path = audio_path.into();
        let transcript = transcript.trim().to_string();

        if !audio_path.exists() {
            return Err(ReferenceError::FileNotFound(audio_path));
        }

        if transcript.is_empty() {
            return Err(ReferenceError::EmptyTranscript);
        }

        Ok(Self {
            audio_path,
            transcript,
        })
    }
}
