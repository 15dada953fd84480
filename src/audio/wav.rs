//! In-memory waveform and WAV encode/decode.

use std::io::{BufWriter, Cursor, Read, Seek};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use thiserror::Error;

/// Errors that can occur while decoding, converting or writing audio.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio file not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("No decodable audio track in {0}")]
    NoAudioTrack(String),

    #[error("Audio contains no samples: {0}")]
    Empty(String),
}

/// Decoded PCM audio with interleaved `f32` samples in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl Waveform {
    /// Create a waveform from interleaved samples.
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
        }
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f32 / self.sample_rate as f32
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Scale the signal so its peak sits `headroom_db` below full scale.
    ///
    /// Silence is left untouched.
    pub fn normalize_peak(&mut self, headroom_db: f32) {
        let peak = self.peak();
        if peak <= 0.0 {
            return;
        }
        let target = 10f32.powf(-headroom_db / 20.0);
        let gain = target / peak;
        for sample in &mut self.samples {
            *sample *= gain;
        }
    }

    /// Decode a WAV file held in memory.
    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self, AudioError> {
        let reader = WavReader::new(Cursor::new(bytes))?;
        read_wav_internal(reader)
    }

    /// Decode a WAV file on disk.
    pub fn read_wav(path: &Path) -> Result<Self, AudioError> {
        if !path.exists() {
            return Err(AudioError::NotFound(path.display().to_string()));
        }
        let reader = WavReader::open(path)?;
        read_wav_internal(reader)
    }

    /// Write 16-bit PCM WAV to `path`.
    ///
    /// Samples go to a temporary file in the destination directory which is
    /// renamed over `path` once complete, so readers never observe a partial
    /// file.
    pub fn write_wav(&self, path: &Path) -> Result<(), AudioError> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let tmp = tempfile::Builder::new()
            .prefix(".partial-")
            .suffix(".wav")
            .tempfile_in(dir)?;

        let spec = WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let mut writer = WavWriter::new(BufWriter::new(tmp.as_file()), spec)?;
        for &sample in &self.samples {
            let value = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
            writer.write_sample(value)?;
        }
        writer.finalize()?;

        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

fn read_wav_internal<R: Read + Seek>(mut reader: WavReader<R>) -> Result<Waveform, AudioError> {
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()?
        }
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
    };

    Ok(Waveform::new(samples, spec.channels, spec.sample_rate))
}
