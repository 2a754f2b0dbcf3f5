//! Locating and loading the fitted scaler and K-Means artifacts

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::data::{StandardScaler, N_FEATURES};
use crate::error::ArtifactError;
use crate::model::{ClusterModel, FeatureScaler, KMeansArtifact, KMeansModel, Segmenter};

/// File name of the fitted K-Means model inside the model directory
pub const MODEL_FILE: &str = "kmeans_model.json";

/// File name of the fitted scaler inside the model directory
pub const SCALER_FILE: &str = "scaler.json";

/// Model directory mandated by the hosted inference platform
pub const SAGEMAKER_MODEL_DIR: &str = "/opt/ml/model";

/// Default model directory for standalone runs, relative to the working directory
pub const STANDALONE_MODEL_DIR: &str = "models";

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let contents = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load and validate `scaler.json` from `model_dir`
pub fn load_scaler(model_dir: &Path) -> Result<StandardScaler, ArtifactError> {
    let path = model_dir.join(SCALER_FILE);
    let scaler: StandardScaler = read_json(&path)?;
    scaler
        .validate()
        .map_err(|reason| ArtifactError::Invalid {
            path: path.clone(),
            reason,
        })?;
    debug!("Loaded scaler from {:?}", path);
    Ok(scaler)
}

/// Load and validate `kmeans_model.json` from `model_dir`
pub fn load_model(model_dir: &Path) -> Result<KMeansModel, ArtifactError> {
    let path = model_dir.join(MODEL_FILE);
    let artifact: KMeansArtifact = read_json(&path)?;
    let model = KMeansModel::try_from(artifact).map_err(|reason| ArtifactError::Invalid {
        path: path.clone(),
        reason,
    })?;
    debug!("Loaded model from {:?}", path);
    Ok(model)
}

/// Load both artifacts and check they agree with each other and with the
/// three RFM features. Any failure here must stop the process from serving.
pub fn load_segmenter(model_dir: &Path) -> Result<Segmenter, ArtifactError> {
    info!("Looking for models in: {:?}", model_dir);

    let model = load_model(model_dir)?;
    let scaler = load_scaler(model_dir)?;

    if scaler.n_features() != model.n_features() {
        return Err(ArtifactError::DimensionMismatch {
            scaler: scaler.n_features(),
            model: model.n_features(),
        });
    }
    if model.n_features() != N_FEATURES {
        return Err(ArtifactError::Invalid {
            path: model_dir.join(MODEL_FILE),
            reason: format!(
                "artifacts were fitted on {} features, expected {}",
                model.n_features(),
                N_FEATURES
            ),
        });
    }

    info!(
        "Loaded K-Means model with {} clusters over {} features",
        model.n_clusters(),
        model.n_features()
    );
    Ok(Segmenter::new(scaler, model))
}
