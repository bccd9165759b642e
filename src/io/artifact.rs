//! Read/write JSON artifacts.
//!
//! Every persisted artifact (scaler state, trained model, metrics, per-source
//! counts) is plain pretty-printed JSON so it can be loaded independently of
//! the run that produced it.

use std::fs::{File, create_dir_all};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// File names used for one named model inside a models directory.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub scaler: PathBuf,
    pub metrics: PathBuf,
    pub sources: PathBuf,
    pub importance: PathBuf,
}

pub const MODEL_SUFFIX: &str = ".model.json";

impl ArtifactPaths {
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            model: dir.join(format!("{name}{MODEL_SUFFIX}")),
            scaler: dir.join(format!("{name}.scaler.json")),
            metrics: dir.join(format!("{name}.metrics.json")),
            sources: dir.join(format!("{name}.sources.json")),
            importance: dir.join(format!("{name}.features.csv")),
        }
    }
}

/// Serialize `value` to `path`, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)
            .map_err(|e| AppError::input(format!("Failed to create directory '{}': {e}", parent.display())))?;
    }
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create '{}': {e}", path.display())))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| AppError::input(format!("Failed to write '{}': {e}", path.display())))?;
    writer
        .flush()
        .map_err(|e| AppError::input(format!("Failed to flush '{}': {e}", path.display())))
}

/// Deserialize a JSON artifact from `path`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open '{}': {e}", path.display())))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::input(format!("Invalid JSON in '{}': {e}", path.display())))
}
