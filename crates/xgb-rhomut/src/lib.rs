//! Strength ratio and ductility prediction for SDOF systems
//!
//! This crate provides:
//! - Closed-form R-mu-T relationships from the literature
//! - Gradient-boosted model prediction of R, rho2 and rho3
//! - Dispersion lookup and inverse ductility estimation
//! - Artifact stores, configuration and observability

pub mod config;
pub mod error;
pub mod formulas;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod store;

pub use config::PredictorConfig;
pub use error::{Result, RhomutError};
pub use models::*;
pub use observability::{init_tracing, PredictorMetrics, StructuredLogger};
pub use predictor::{predict_with_deadline, Predictor};
pub use store::{ArtifactStore, FileArtifactStore, InMemoryArtifactStore, ModelArtifacts};
