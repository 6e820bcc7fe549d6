//! Model artifact storage
//!
//! Each model key has three artifacts: a regressor, the feature scaler it was
//! trained with and a dispersion table. [`FileArtifactStore`] reads them from
//! a model directory laid out as:
//!
//! ```text
//! models/
//!   ro_2_xgb.json              XGBoost JSON model (or ro_2_xgb.onnx)
//!   ro_2_xgb_scaler.json       fitted scaler parameters
//!   ro_2_xgb_dispersion.json   dispersion table
//! ```

use crate::error::{Result, RhomutError};
use crate::models::{ArtifactResource, ModelKey, Quantity};
use crate::observability::{PredictorMetrics, StructuredLogger};
use crate::predictor::{
    DispersionTable, FeatureScaler, FittedScaler, OnnxRegressor, Regressor, TreeEnsemble,
};
use anyhow::Context;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Every model key a predictor can be configured with
pub const ALL_MODEL_KEYS: [ModelKey; 6] = [
    ModelKey { quantity: Quantity::R, collapse: false },
    ModelKey { quantity: Quantity::R, collapse: true },
    ModelKey { quantity: Quantity::Rho2, collapse: false },
    ModelKey { quantity: Quantity::Rho2, collapse: true },
    ModelKey { quantity: Quantity::Rho3, collapse: false },
    ModelKey { quantity: Quantity::Rho3, collapse: true },
];

/// Loaded artifacts for one model key
pub struct ModelArtifacts {
    pub regressor: Box<dyn Regressor>,
    pub scaler: Box<dyn FeatureScaler>,
    pub dispersion: DispersionTable,
}

impl ModelArtifacts {
    pub fn new(
        regressor: Box<dyn Regressor>,
        scaler: Box<dyn FeatureScaler>,
        dispersion: DispersionTable,
    ) -> Self {
        Self {
            regressor,
            scaler,
            dispersion,
        }
    }
}

/// Source of model artifacts
pub trait ArtifactStore: Send + Sync {
    /// Artifacts for `key`, failing with `ArtifactNotFound` or `ArtifactLoad`
    fn load(&self, key: ModelKey) -> Result<Arc<ModelArtifacts>>;
}

/// Artifacts held in memory, mostly for tests and embedding
#[derive(Default)]
pub struct InMemoryArtifactStore {
    artifacts: DashMap<ModelKey, Arc<ModelArtifacts>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: ModelKey, artifacts: ModelArtifacts) {
        self.artifacts.insert(key, Arc::new(artifacts));
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn load(&self, key: ModelKey) -> Result<Arc<ModelArtifacts>> {
        self.artifacts
            .get(&key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(RhomutError::ArtifactNotFound {
                key,
                resource: ArtifactResource::Regressor,
            })
    }
}

/// Artifacts read from a model directory, cached after first load
pub struct FileArtifactStore {
    model_dir: PathBuf,
    cache_enabled: bool,
    cache: DashMap<ModelKey, Arc<ModelArtifacts>>,
    logger: StructuredLogger,
    metrics: PredictorMetrics,
}

impl FileArtifactStore {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            cache_enabled: true,
            cache: DashMap::new(),
            logger: StructuredLogger::new("artifact-store"),
            metrics: PredictorMetrics::new(),
        }
    }

    /// Disable caching to re-read artifacts on every load
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Load and cache every key whose regressor exists in the model directory.
    ///
    /// Returns the keys that were loaded.
    pub fn preload(&self) -> Result<Vec<ModelKey>> {
        let mut loaded = Vec::new();
        for key in ALL_MODEL_KEYS {
            if self.regressor_path(key).is_none() {
                continue;
            }
            self.load(key)?;
            loaded.push(key);
        }
        Ok(loaded)
    }

    /// Path of the regressor for `key`, preferring XGBoost JSON over ONNX
    pub fn regressor_path(&self, key: ModelKey) -> Option<PathBuf> {
        ["json", "onnx"]
            .into_iter()
            .map(|ext| self.model_dir.join(format!("{key}.{ext}")))
            .find(|path| path.is_file())
    }

    pub fn scaler_path(&self, key: ModelKey) -> PathBuf {
        self.model_dir.join(format!("{key}_scaler.json"))
    }

    pub fn dispersion_path(&self, key: ModelKey) -> PathBuf {
        self.model_dir.join(format!("{key}_dispersion.json"))
    }

    fn read_artifacts(&self, key: ModelKey) -> Result<ModelArtifacts> {
        let regressor_path = self
            .regressor_path(key)
            .ok_or(RhomutError::ArtifactNotFound {
                key,
                resource: ArtifactResource::Regressor,
            })?;
        let regressor_bytes = self.read(key, ArtifactResource::Regressor, &regressor_path)?;
        let regressor: Box<dyn Regressor> =
            if regressor_path.extension().is_some_and(|ext| ext == "onnx") {
                Box::new(
                    OnnxRegressor::from_bytes(&regressor_bytes, key.feature_count())
                        .map_err(|e| load_error(key, ArtifactResource::Regressor, e))?,
                )
            } else {
                let ensemble = TreeEnsemble::from_json(&regressor_bytes)
                    .map_err(|e| load_error(key, ArtifactResource::Regressor, e))?;
                debug!(model = %key, trees = ensemble.num_trees(), "Parsed tree ensemble");
                Box::new(ensemble)
            };

        let scaler_bytes = self.read(key, ArtifactResource::Scaler, &self.scaler_path(key))?;
        let scaler = FittedScaler::from_json(&scaler_bytes)
            .and_then(|scaler| {
                if scaler.feature_count() != key.feature_count() {
                    anyhow::bail!(
                        "scaler has {} features, model expects {}",
                        scaler.feature_count(),
                        key.feature_count()
                    );
                }
                Ok(scaler)
            })
            .map_err(|e| load_error(key, ArtifactResource::Scaler, e))?;

        let dispersion_bytes =
            self.read(key, ArtifactResource::Dispersion, &self.dispersion_path(key))?;
        let dispersion = DispersionTable::from_json(&dispersion_bytes)
            .map_err(|e| load_error(key, ArtifactResource::Dispersion, e))?;

        Ok(ModelArtifacts::new(regressor, Box::new(scaler), dispersion))
    }

    fn read(&self, key: ModelKey, resource: ArtifactResource, path: &Path) -> Result<Vec<u8>> {
        if !path.is_file() {
            return Err(RhomutError::ArtifactNotFound { key, resource });
        }
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))
            .map_err(|e| load_error(key, resource, e))?;

        self.logger
            .log_artifact_loaded(key, resource, path, bytes.len(), &compute_checksum(&bytes));
        Ok(bytes)
    }
}

impl ArtifactStore for FileArtifactStore {
    fn load(&self, key: ModelKey) -> Result<Arc<ModelArtifacts>> {
        if self.cache_enabled {
            if let Some(cached) = self.cache.get(&key) {
                return Ok(Arc::clone(cached.value()));
            }
        }

        let artifacts = match self.read_artifacts(key) {
            Ok(artifacts) => Arc::new(artifacts),
            Err(e) => {
                self.metrics.inc_artifact_load_errors();
                return Err(e);
            }
        };
        self.metrics.inc_artifact_loads();

        if self.cache_enabled {
            // Concurrent first loads may both read; the first insert wins
            let entry = self.cache.entry(key).or_insert(artifacts);
            return Ok(Arc::clone(entry.value()));
        }
        Ok(artifacts)
    }
}

fn load_error(key: ModelKey, resource: ArtifactResource, source: anyhow::Error) -> RhomutError {
    RhomutError::ArtifactLoad {
        key,
        resource,
        source,
    }
}

/// Compute SHA256 checksum of data
fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
