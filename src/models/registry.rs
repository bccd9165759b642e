//! Load-once registry of persisted models.
//!
//! Built by scanning a models directory for `*.model.json`. Each entry carries
//! its optional scaler and metrics next to it. The map is never mutated after
//! construction; callers get shared references.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::domain::MetricsArtifact;
use crate::error::AppError;
use crate::io::artifact::{ArtifactPaths, MODEL_SUFFIX, read_json};
use crate::models::ModelArtifact;
use crate::scaling::Scaler;

#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub model: ModelArtifact,
    pub scaler: Option<Scaler>,
    pub metrics: Option<MetricsArtifact>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    dir: PathBuf,
    entries: BTreeMap<String, RegistryEntry>,
}

impl ModelRegistry {
    pub fn load(dir: &Path) -> Result<Self, AppError> {
        let read = fs::read_dir(dir)
            .map_err(|e| AppError::input(format!("Failed to read models directory '{}': {e}", dir.display())))?;

        let mut entries = BTreeMap::new();
        for item in read {
            let item = item.map_err(|e| AppError::input(format!("Failed to list '{}': {e}", dir.display())))?;
            let file_name = item.file_name();
            let Some(name) = file_name.to_str().and_then(|f| f.strip_suffix(MODEL_SUFFIX)) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }

            let paths = ArtifactPaths::new(dir, name);
            let model = ModelArtifact::load(&paths.model)?;
            let scaler = if paths.scaler.exists() {
                Some(Scaler::load(&paths.scaler)?)
            } else {
                warn!("model '{name}' has no scaler artifact; inputs will be used unscaled");
                None
            };
            let metrics = if paths.metrics.exists() {
                Some(read_json::<MetricsArtifact>(&paths.metrics)?)
            } else {
                None
            };

            entries.insert(name.to_string(), RegistryEntry { model, scaler, metrics });
        }

        info!("loaded {} model(s) from {}", entries.len(), dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            entries,
        })
    }

    pub fn get(&self, name: &str) -> Result<&RegistryEntry, AppError> {
        self.entries.get(name).ok_or_else(|| {
            let available = self.list();
            let available = if available.is_empty() {
                "none".to_string()
            } else {
                available.join(", ")
            };
            AppError::input(format!(
                "Model '{name}' not found in '{}'. Available: {available}",
                self.dir.display()
            ))
        })
    }

    pub fn list(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ScalingMethod, feature_names};
    use crate::models::{BoostedTrees, BoosterParams, Classifier};
    use chrono::Utc;
    use nalgebra::DMatrix;

    fn write_model(dir: &Path, name: &str, with_scaler: bool) {
        let x = DMatrix::from_fn(20, 5, |r, c| (r % 2) as f64 * 3.0 + c as f64);
        let y: Vec<u8> = (0..20).map(|r| (r % 2) as u8).collect();
        let mut model = BoostedTrees::new(BoosterParams {
            n_estimators: 3,
            ..BoosterParams::default()
        });
        model.fit(&x, &y).unwrap();

        let paths = ArtifactPaths::new(dir, name);
        ModelArtifact {
            name: name.to_string(),
            feature_names: feature_names(),
            trained_at: Utc::now(),
            model,
        }
        .save(&paths.model)
        .unwrap();
        if with_scaler {
            Scaler::new(ScalingMethod::Robust)
                .fit(&x, &feature_names())
                .unwrap()
                .save(&paths.scaler)
                .unwrap();
        }
    }

    #[test]
    fn loads_models_and_optional_scalers() {
        let dir = tempfile::tempdir().unwrap();
        write_model(dir.path(), "alpha", true);
        write_model(dir.path(), "beta", false);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let registry = ModelRegistry::load(dir.path()).unwrap();
        assert_eq!(registry.list(), vec!["alpha", "beta"]);
        assert!(registry.get("alpha").unwrap().scaler.is_some());
        assert!(registry.get("beta").unwrap().scaler.is_none());
    }

    #[test]
    fn missing_model_lists_available_names() {
        let dir = tempfile::tempdir().unwrap();
        write_model(dir.path(), "alpha", true);
        let registry = ModelRegistry::load(dir.path()).unwrap();
        let err = registry.get("gamma").unwrap_err();
        assert!(err.to_string().contains("alpha"));
    }

    #[test]
    fn missing_directory_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelRegistry::load(&dir.path().join("nope")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
