use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use chrono::Local;
use tokio::sync::Mutex;

use crate::audio::AudioConverter;
use crate::backend::Models;
use crate::cli::ServeArgs;
use crate::engine::TimestampNamer;
use crate::voice::UploadStore;

/// Filesystem layout and request settings for the web service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub static_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub generations_dir: PathBuf,
    pub stt_language: String,
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Create the upload, generation and static directories if missing.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.static_dir, &self.uploads_dir, &self.generations_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

impl From<&ServeArgs> for ServerConfig {
    fn from(args: &ServeArgs) -> Self {
        Self {
            static_dir: args.static_dir.clone(),
            uploads_dir: args.uploads_dir.clone(),
            generations_dir: args.generations_dir.clone(),
            stt_language: args.stt_language.clone(),
            max_upload_bytes: args.max_upload_mb * 1024 * 1024,
        }
    }
}

/// Application context injected into every handler.
#[derive(Clone)]
pub struct AppState {
    // Installed once by the background loader; empty while models load
    models: Arc<OnceLock<Models>>,
    // The cloning model is one shared resource: generations run one at a time
    pub lock: Arc<Mutex<()>>,
    pub namer: Arc<TimestampNamer>,
    pub uploads: UploadStore,
    pub converter: AudioConverter,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            models: Arc::new(OnceLock::new()),
            lock: Arc::new(Mutex::new(())),
            namer: Arc::new(TimestampNamer::new()),
            uploads: UploadStore::with_dir(config.uploads_dir.clone()),
            converter: AudioConverter::new(),
            config: Arc::new(config),
        }
    }

    /// Make loaded models visible to handlers. Returns `false` if models were
    /// already installed.
    pub fn install_models(&self, models: Models) -> bool {
        self.models.set(models).is_ok()
    }

    /// Loaded models, or `None` while loading is still in progress.
    pub fn models(&self) -> Option<&Models> {
        self.models.get()
    }

    /// Path for the next generated file, never reusing an existing name.
    pub fn next_output_path(&self) -> (String, PathBuf) {
        loop {
            let filename = self.namer.next_filename(Local::now());
            let path = self.config.generations_dir.join(&filename);
            if !path.exists() {
                return (filename, path);
            }
        }
    }
}
