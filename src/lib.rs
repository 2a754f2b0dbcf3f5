//! rfm-serve: HTTP inference for RFM (Recency, Frequency, Monetary) customer segmentation
//!
//! Loads a fitted standard scaler and K-Means model once at startup and assigns
//! incoming customers to a cluster: `log1p` -> scale -> nearest centroid.

pub mod artifacts;
pub mod cli;
pub mod data;
pub mod error;
pub mod model;
pub mod server;

// Re-export public items for easier access
pub use artifacts::{load_segmenter, MODEL_FILE, SCALER_FILE};
pub use cli::{Args, Platform};
pub use data::{RfmFeatures, StandardScaler};
pub use error::{ApiError, ArtifactError, PredictError};
pub use model::{ClusterModel, FeatureScaler, KMeansArtifact, KMeansModel, Segmenter};
pub use server::router;

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
