//! Audio preparation for voice cloning.
//!
//! Decodes arbitrary audio containers, normalizes loudness and writes the
//! canonical WAV files the models consume, caching conversions by file
//! modification time.

mod convert;
mod wav;

pub use convert::{AudioConverter, NORMALIZE_HEADROOM_DB, decode_file, is_fresh};
pub use wav::{AudioError, Waveform};

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn sine(amplitude: f32, freq: f32, sample_rate: u32, secs: f32) -> Waveform {
        let frames = (sample_rate as f32 * secs) as usize;
        let samples = (0..frames)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                amplitude * (2.0 * std::f32::consts::PI * freq * t).sin()
            })
            .collect();
        Waveform::new(samples, 1, sample_rate)
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(time).unwrap();
    }

    // ===========================================
    // Waveform tests
    // ===========================================

    #[test]
    fn test_waveform_duration() {
        let wave = Waveform::new(vec![0.0; 48_000], 2, 24_000);
        assert_eq!(wave.frames(), 24_000);
        assert!((wave.duration_secs() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_normalize_peak_reaches_headroom() {
        let mut wave = Waveform::new(vec![0.1, -0.25, 0.05], 1, 16_000);
        wave.normalize_peak(NORMALIZE_HEADROOM_DB);

        let expected = 10f32.powf(-NORMALIZE_HEADROOM_DB / 20.0);
        assert!((wave.peak() - expected).abs() < 1e-5);
        // Relative levels are preserved
        assert!((wave.samples[0] / wave.samples[1] + 0.4).abs() < 1e-5);
    }

    #[test]
    fn test_normalize_peak_leaves_silence() {
        let mut wave = Waveform::new(vec![0.0; 16], 1, 16_000);
        wave.normalize_peak(NORMALIZE_HEADROOM_DB);
        assert!(wave.samples.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_write_then_read_wav() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tone.wav");

        let wave = sine(0.5, 440.0, 16_000, 0.25);
        wave.write_wav(&path).unwrap();

        let loaded = Waveform::read_wav(&path).unwrap();
        assert_eq!(loaded.sample_rate, 16_000);
        assert_eq!(loaded.channels, 1);
        assert_eq!(loaded.frames(), wave.frames());
        assert!((loaded.peak() - 0.5).abs() < 1e-3);

        // No temporary files left behind
        let entries: Vec<_> = std::fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_from_wav_bytes_rejects_garbage() {
        let result = Waveform::from_wav_bytes(b"definitely not a wav file");
        assert!(matches!(result, Err(AudioError::Wav(_))));
    }

    // ===========================================
    // AudioConverter tests
    // ===========================================

    #[test]
    fn test_converted_path() {
        let path = AudioConverter::converted_path(Path::new("uploads/my_voice.m4a"));
        assert_eq!(path, Path::new("uploads/my_voice_converted.wav"));
    }

    #[test]
    fn test_convert_normalizes_quiet_audio() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("quiet.wav");
        sine(0.2, 220.0, 16_000, 0.5).write_wav(&source).unwrap();

        let target = AudioConverter::new().convert(&source).unwrap();
        assert_eq!(target, temp_dir.path().join("quiet_converted.wav"));

        let converted = Waveform::read_wav(&target).unwrap();
        assert!(converted.peak() > 0.95);
        assert_eq!(converted.sample_rate, 16_000);
    }

    #[test]
    fn test_convert_without_normalize_keeps_level() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("plain.wav");
        sine(0.2, 220.0, 16_000, 0.5).write_wav(&source).unwrap();

        let target = AudioConverter::new()
            .with_normalize(false)
            .convert(&source)
            .unwrap();

        let converted = Waveform::read_wav(&target).unwrap();
        assert!((converted.peak() - 0.2).abs() < 1e-2);
    }

    #[test]
    fn test_convert_cache_hit_returns_unchanged_file() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("voice.wav");
        sine(0.3, 330.0, 16_000, 0.5).write_wav(&source).unwrap();

        let converter = AudioConverter::new();
        let target = converter.convert(&source).unwrap();

        // Replace the cached file with sentinel bytes; a cache hit must not touch it
        std::fs::write(&target, b"cached sentinel").unwrap();
        let later = SystemTime::now() + Duration::from_secs(5);
        set_mtime(&target, later);

        let again = converter.convert(&source).unwrap();
        assert_eq!(again, target);
        assert_eq!(std::fs::read(&target).unwrap(), b"cached sentinel");
    }

    #[test]
    fn test_convert_reconverts_when_source_is_newer() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("voice.wav");
        sine(0.3, 330.0, 16_000, 0.5).write_wav(&source).unwrap();

        let converter = AudioConverter::new().with_normalize(false);
        let target = converter.convert(&source).unwrap();
        let first = std::fs::read(&target).unwrap();

        // Rewrite the source with different content and a later mtime
        sine(0.6, 880.0, 16_000, 0.25).write_wav(&source).unwrap();
        set_mtime(&source, SystemTime::now() + Duration::from_secs(5));

        converter.convert(&source).unwrap();
        let second = std::fs::read(&target).unwrap();

        assert_ne!(first, second);
        let converted = Waveform::read_wav(&target).unwrap();
        assert!((converted.duration_secs() - 0.25).abs() < 0.01);
    }

    #[test]
    fn test_convert_undecodable_source_fails() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("broken.m4a");
        std::fs::write(&source, b"this is not audio at all").unwrap();

        let result = AudioConverter::new().convert(&source);
        assert!(result.is_err());
        assert!(!AudioConverter::converted_path(&source).exists());
    }

    #[test]
    fn test_convert_missing_source_fails() {
        let result = AudioConverter::new().convert(Path::new("/nonexistent/voice.wav"));
        assert!(matches!(result, Err(AudioError::NotFound(_))));
    }

    #[test]
    fn test_passthrough_keeps_wav_source() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("reference.WAV");
        sine(0.3, 330.0, 16_000, 0.1).write_wav(&source).unwrap();

        let result = AudioConverter::passthrough().convert(&source).unwrap();
        assert_eq!(result, source);
        assert!(!AudioConverter::converted_path(&source).exists());
    }

    #[test]
    fn test_is_fresh_missing_target() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.wav");
        std::fs::write(&source, b"x").unwrap();

        assert!(!is_fresh(&temp_dir.path().join("missing.wav"), &source).unwrap());
    }
}
