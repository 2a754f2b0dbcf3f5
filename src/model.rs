//! K-Means centroid model and the scoring pipeline

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::data::RfmFeatures;
use crate::error::PredictError;

/// A fitted transform mapping a raw vector to a normalized one of the same length
pub trait FeatureScaler {
    fn n_features(&self) -> usize;
    fn transform(&self, features: &Array1<f64>) -> Result<Array1<f64>, PredictError>;
}

/// A fitted partitioning model assigning a normalized vector to a cluster
pub trait ClusterModel {
    fn n_features(&self) -> usize;
    fn n_clusters(&self) -> usize;
    fn predict(&self, features: &Array1<f64>) -> Result<usize, PredictError>;
}

/// On-disk form of the fitted K-Means model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeansArtifact {
    /// One row per cluster, in normalized feature space
    pub centroids: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_clusters: Option<usize>,
}

/// K-Means model reduced to what inference needs
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansModel {
    /// Cluster centroids in normalized space (n_clusters, n_features)
    pub centroids: Array2<f64>,
}

impl KMeansModel {
    /// Build a model from centroid rows, rejecting ragged or non-finite input
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, String> {
        let n_features = rows.first().map(Vec::len).unwrap_or(0);
        if n_features == 0 {
            return Err("model has no centroids".to_string());
        }
        if let Some(idx) = rows.iter().position(|row| row.len() != n_features) {
            return Err(format!(
                "centroid {} has {} features, expected {}",
                idx,
                rows[idx].len(),
                n_features
            ));
        }
        if rows.iter().flatten().any(|v| !v.is_finite()) {
            return Err("centroids must be finite".to_string());
        }

        let data: Vec<f64> = rows.iter().flatten().copied().collect();
        let centroids =
            Array2::from_shape_vec((rows.len(), n_features), data).map_err(|e| e.to_string())?;
        Ok(Self { centroids })
    }
}

impl TryFrom<KMeansArtifact> for KMeansModel {
    type Error = String;

    fn try_from(artifact: KMeansArtifact) -> Result<Self, Self::Error> {
        let model = Self::from_rows(&artifact.centroids)?;
        match artifact.n_clusters {
            Some(k) if k != model.n_clusters() => Err(format!(
                "n_clusters is {} but {} centroids were given",
                k,
                model.n_clusters()
            )),
            _ => Ok(model),
        }
    }
}

impl ClusterModel for KMeansModel {
    fn n_features(&self) -> usize {
        self.centroids.ncols()
    }

    fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }

    /// Nearest centroid by squared Euclidean distance; ties go to the lowest index
    fn predict(&self, features: &Array1<f64>) -> Result<usize, PredictError> {
        if features.len() != self.n_features() {
            return Err(PredictError::DimensionMismatch {
                expected: self.n_features(),
                actual: features.len(),
            });
        }
        if features.iter().any(|v| !v.is_finite()) {
            return Err(PredictError::NonFinite { stage: "scaling" });
        }

        let mut min_distance = f64::INFINITY;
        let mut closest_cluster = 0;

        for (cluster_idx, centroid) in self.centroids.outer_iter().enumerate() {
            let distance: f64 = features
                .iter()
                .zip(centroid.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();

            if distance < min_distance {
                min_distance = distance;
                closest_cluster = cluster_idx;
            }
        }

        Ok(closest_cluster)
    }
}

/// Immutable scaler + model pair shared by every request.
///
/// Scoring is `log1p` -> scaler -> nearest centroid, always in that order.
pub struct Segmenter {
    scaler: Box<dyn FeatureScaler + Send + Sync>,
    model: Box<dyn ClusterModel + Send + Sync>,
}

impl std::fmt::Debug for Segmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segmenter")
            .field("n_features", &self.n_features())
            .field("n_clusters", &self.n_clusters())
            .finish()
    }
}

impl Segmenter {
    /// Pair a scaler with a model. Callers are expected to have checked
    /// that both agree on dimensionality, see [`crate::artifacts::load_segmenter`].
    pub fn new(
        scaler: impl FeatureScaler + Send + Sync + 'static,
        model: impl ClusterModel + Send + Sync + 'static,
    ) -> Self {
        Self {
            scaler: Box::new(scaler),
            model: Box::new(model),
        }
    }

    pub fn n_features(&self) -> usize {
        self.model.n_features()
    }

    pub fn n_clusters(&self) -> usize {
        self.model.n_clusters()
    }

    /// Log-transform and standardize raw features
    pub fn normalize(&self, features: &RfmFeatures) -> Result<Array1<f64>, PredictError> {
        let logged = features.log1p();
        if logged.iter().any(|v| !v.is_finite()) {
            return Err(PredictError::NonFinite { stage: "log1p" });
        }
        self.scaler.transform(&logged)
    }

    /// Assign a cluster id in `[0, n_clusters)`
    pub fn predict(&self, features: &RfmFeatures) -> Result<usize, PredictError> {
        let normalized = self.normalize(features)?;
        self.model.predict(&normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::StandardScaler;
    use ndarray::arr1;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn create_test_model() -> KMeansModel {
        KMeansModel::from_rows(&[
            vec![-1.0, -1.0, -1.0], // Low R, F, M
            vec![1.0, 1.0, 1.0],    // High R, F, M
            vec![-0.5, 0.5, -0.5],  // Medium values
        ])
        .unwrap()
    }

    fn identity_scaler() -> StandardScaler {
        StandardScaler::new(vec![0.0; 3], vec![1.0; 3])
    }

    #[test]
    fn test_predict_nearest_centroid() {
        let model = create_test_model();
        assert_eq!(model.predict(&arr1(&[-0.9, -1.1, -1.0])).unwrap(), 0);
        assert_eq!(model.predict(&arr1(&[2.0, 2.0, 2.0])).unwrap(), 1);
        assert_eq!(model.predict(&arr1(&[-0.4, 0.6, -0.4])).unwrap(), 2);
    }

    #[test]
    fn test_predict_tie_goes_to_lowest_index() {
        let model = KMeansModel::from_rows(&[vec![1.0, 0.0, 0.0], vec![-1.0, 0.0, 0.0]]).unwrap();
        assert_eq!(model.predict(&arr1(&[0.0, 0.0, 0.0])).unwrap(), 0);
    }

    #[test]
    fn test_predict_rejects_wrong_dimension() {
        let model = create_test_model();
        assert_eq!(
            model.predict(&arr1(&[0.0, 0.0])).unwrap_err(),
            PredictError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn test_from_rows_validation() {
        assert!(KMeansModel::from_rows(&[]).is_err());
        assert!(KMeansModel::from_rows(&[vec![0.0, 0.0, 0.0], vec![0.0, 0.0]]).is_err());
        assert!(KMeansModel::from_rows(&[vec![0.0, f64::INFINITY, 0.0]]).is_err());

        let model = create_test_model();
        assert_eq!(model.n_clusters(), 3);
        assert_eq!(model.n_features(), 3);
    }

    #[test]
    fn test_artifact_cluster_count_must_match() {
        let artifact = KMeansArtifact {
            centroids: vec![vec![0.0, 0.0, 0.0]],
            n_clusters: Some(2),
        };
        assert!(KMeansModel::try_from(artifact).is_err());

        let artifact = KMeansArtifact {
            centroids: vec![vec![0.0, 0.0, 0.0]],
            n_clusters: Some(1),
        };
        assert!(KMeansModel::try_from(artifact).is_ok());
    }

    #[test]
    fn test_segmenter_predict_in_range_and_deterministic() {
        let segmenter = Segmenter::new(identity_scaler(), create_test_model());
        let inputs = [
            RfmFeatures::new(5.0, 10.0, 200.0),
            RfmFeatures::new(0.0, 0.0, 0.0),
            RfmFeatures::new(365.0, 1.0, 12.5),
            RfmFeatures::new(-0.5, 3.0, 1e6),
        ];
        for input in inputs.iter() {
            let first = segmenter.predict(input).unwrap();
            assert!(first < segmenter.n_clusters());
            assert_eq!(segmenter.predict(input).unwrap(), first);
        }
    }

    #[test]
    fn test_segmenter_applies_log_before_scaling() {
        // Mean equal to log1p of the input centres it exactly on the origin
        let input = RfmFeatures::new(5.0, 10.0, 200.0);
        let scaler = StandardScaler::new(input.log1p().to_vec(), vec![1.0; 3]);
        let segmenter = Segmenter::new(scaler, create_test_model());

        let normalized = segmenter.normalize(&input).unwrap();
        assert!(normalized.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_segmenter_normalize_is_repeatable() {
        let scaler = StandardScaler::new(vec![2.0, 1.0, 5.0], vec![1.3, 0.6, 1.8]);
        let segmenter = Segmenter::new(scaler, create_test_model());
        let input = RfmFeatures::new(5.0, 10.0, 200.0);

        let first = segmenter.normalize(&input).unwrap();
        let second = segmenter.normalize(&input).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_segmenter_rejects_log1p_domain() {
        let segmenter = Segmenter::new(identity_scaler(), create_test_model());
        assert_eq!(
            segmenter
                .predict(&RfmFeatures::new(-1.0, 0.0, 0.0))
                .unwrap_err(),
            PredictError::NonFinite { stage: "log1p" }
        );
        assert!(segmenter.predict(&RfmFeatures::new(0.0, -3.0, 0.0)).is_err());
    }

    struct CountingModel {
        calls: Arc<AtomicUsize>,
    }

    impl ClusterModel for CountingModel {
        fn n_features(&self) -> usize {
            3
        }

        fn n_clusters(&self) -> usize {
            4
        }

        fn predict(&self, _features: &Array1<f64>) -> Result<usize, PredictError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(3)
        }
    }

    #[test]
    fn test_segmenter_with_injected_model() {
        let calls = Arc::new(AtomicUsize::new(0));
        let segmenter = Segmenter::new(
            identity_scaler(),
            CountingModel {
                calls: Arc::clone(&calls),
            },
        );

        assert_eq!(segmenter.predict(&RfmFeatures::new(1.0, 1.0, 1.0)).unwrap(), 3);
        assert!(segmenter.predict(&RfmFeatures::new(-2.0, 1.0, 1.0)).is_err());
        // The invalid input never reaches the model
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
