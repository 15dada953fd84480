//! Conversion of arbitrary audio containers into canonical WAV files.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::wav::{AudioError, Waveform};

/// Peak headroom applied when normalizing reference audio.
pub const NORMALIZE_HEADROOM_DB: f32 = 0.1;

/// Suffix appended to the source stem for converted files.
const CONVERTED_SUFFIX: &str = "_converted.wav";

/// Converts uploaded audio into the canonical waveform file the models consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConverter {
    normalize: bool,
    passthrough_wav: bool,
}

impl AudioConverter {
    /// Converter used by the web service: every input is decoded and
    /// peak-normalized so quiet recordings are clearly audible.
    pub fn new() -> Self {
        Self {
            normalize: true,
            passthrough_wav: false,
        }
    }

    /// Converter used by the console tool: `.wav` sources are used as-is and
    /// other formats are converted without normalization.
    pub fn passthrough() -> Self {
        Self {
            normalize: false,
            passthrough_wav: true,
        }
    }

    /// Enable or disable peak normalization.
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Path of the converted file derived from `source`.
    pub fn converted_path(source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        source.with_file_name(format!("{stem}{CONVERTED_SUFFIX}"))
    }

    /// Convert `source` to a canonical WAV file and return its path.
    ///
    /// A previously converted file is reused when it is not older than the
    /// source.
    pub fn convert(&self, source: &Path) -> Result<PathBuf, AudioError> {
        if !source.exists() {
            return Err(AudioError::NotFound(source.display().to_string()));
        }

        if self.passthrough_wav && has_wav_extension(source) {
            return Ok(source.to_path_buf());
        }

        let target = Self::converted_path(source);

        if is_fresh(&target, source)? {
            tracing::debug!(path = %target.display(), "using cached conversion");
            return Ok(target);
        }

        tracing::info!(source = %source.display(), target = %target.display(), "converting audio");

        let mut waveform = decode_file(source)?;
        if self.normalize {
            waveform.normalize_peak(NORMALIZE_HEADROOM_DB);
        }
        waveform.write_wav(&target)?;

        tracing::info!(
            path = %target.display(),
            duration_secs = waveform.duration_secs(),
            sample_rate = waveform.sample_rate,
            "conversion complete"
        );

        Ok(target)
    }
}

impl Default for AudioConverter {
    fn default() -> Self {
        Self::new()
    }
}

fn has_wav_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
}

/// Whether `target` exists and was modified no earlier than `source`.
pub fn is_fresh(target: &Path, source: &Path) -> io::Result<bool> {
    let target_meta = match std::fs::metadata(target) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    let source_meta = std::fs::metadata(source)?;

    Ok(target_meta.modified()? >= source_meta.modified()?)
}

/// Decode every packet of the first audio track in `path`.
pub fn decode_file(path: &Path) -> Result<Waveform, AudioError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::NoAudioTrack(path.display().to_string()))?;
    let track_id = track.id;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16);
    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate.get_or_insert(spec.rate);
                channels.get_or_insert(spec.channels.count() as u16);

                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            // Corrupt packets are skipped, the rest of the stream is still usable
            Err(SymphoniaError::DecodeError(msg)) => {
                tracing::warn!(path = %path.display(), error = msg, "skipping undecodable packet");
            }
            Err(e) => return Err(e.into()),
        }
    }

    match (sample_rate, channels) {
        (Some(rate), Some(channels)) if !samples.is_empty() && channels > 0 => {
            Ok(Waveform::new(samples, channels, rate))
        }
        _ => Err(AudioError::Empty(path.display().to_string())),
    }
}
