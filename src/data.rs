//! RFM feature vectors, request validation and the standardization artifact

use ndarray::{arr1, Array1};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PredictError;
use crate::model::FeatureScaler;

/// Number of features every artifact must be fitted on
pub const N_FEATURES: usize = 3;

/// Request keys, in model column order
pub const FEATURE_NAMES: [&str; N_FEATURES] = ["recency", "frequency", "monetary"];

/// Raw customer behaviour values as submitted by a client
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RfmFeatures {
    /// Time since last activity
    pub recency: f64,
    /// Count of activities
    pub frequency: f64,
    /// Cumulative spend
    pub monetary: f64,
}

/// Why a request body could not be turned into [`RfmFeatures`]
#[derive(Debug, Clone, PartialEq)]
pub enum FieldError {
    NotAnObject,
    Missing(Vec<&'static str>),
    NotNumeric(&'static str),
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldError::NotAnObject => write!(
                f,
                "Request body must be a JSON object with recency, frequency and monetary"
            ),
            FieldError::Missing(fields) => write!(
                f,
                "Missing one of recency, frequency, or monetary (missing: {})",
                fields.join(", ")
            ),
            FieldError::NotNumeric(field) => write!(f, "Field '{}' must be a number", field),
        }
    }
}

impl std::error::Error for FieldError {}

impl RfmFeatures {
    pub fn new(recency: f64, frequency: f64, monetary: f64) -> Self {
        Self {
            recency,
            frequency,
            monetary,
        }
    }

    /// Extract the three features from a free-form JSON object.
    ///
    /// Absent and `null` keys both count as missing. Extra keys are ignored.
    /// No range check is applied.
    pub fn from_json(body: &Value) -> Result<Self, FieldError> {
        let object = body.as_object().ok_or(FieldError::NotAnObject)?;

        let missing: Vec<&'static str> = FEATURE_NAMES
            .iter()
            .copied()
            .filter(|name| object.get(*name).map_or(true, Value::is_null))
            .collect();
        if !missing.is_empty() {
            return Err(FieldError::Missing(missing));
        }

        Ok(Self {
            recency: numeric_field(object, "recency")?,
            frequency: numeric_field(object, "frequency")?,
            monetary: numeric_field(object, "monetary")?,
        })
    }

    /// Feature vector in model column order
    pub fn to_array(&self) -> Array1<f64> {
        arr1(&[self.recency, self.frequency, self.monetary])
    }

    /// Elementwise `ln(1 + x)`, the transform the model was fitted after
    pub fn log1p(&self) -> Array1<f64> {
        self.to_array().mapv(f64::ln_1p)
    }
}

fn numeric_field(object: &Map<String, Value>, name: &'static str) -> Result<f64, FieldError> {
    object
        .get(name)
        .and_then(Value::as_f64)
        .ok_or(FieldError::NotNumeric(name))
}

/// Fitted per-feature standardization: `(x - mean) / scale`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    #[serde(default = "default_true")]
    pub with_mean: bool,
    #[serde(default = "default_true")]
    pub with_std: bool,
}

fn default_true() -> bool {
    true
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Self {
        Self {
            mean,
            scale,
            with_mean: true,
            with_std: true,
        }
    }

    /// Check the fitted statistics are usable; returns the reason when not
    pub fn validate(&self) -> Result<(), String> {
        if self.mean.len() != self.scale.len() {
            return Err(format!(
                "mean has {} entries but scale has {}",
                self.mean.len(),
                self.scale.len()
            ));
        }
        if self.mean.is_empty() {
            return Err("scaler has no features".to_string());
        }
        if self.mean.iter().chain(self.scale.iter()).any(|v| !v.is_finite()) {
            return Err("scaler statistics must be finite".to_string());
        }
        // Zero marks a constant feature; anything else must divide cleanly
        if let Some(scale) = self
            .scale
            .iter()
            .find(|&&s| s < 0.0 || (s != 0.0 && !s.is_normal()))
        {
            return Err(format!(
                "scale {:e} must be zero or a positive normal number",
                scale
            ));
        }
        Ok(())
    }
}

impl FeatureScaler for StandardScaler {
    fn n_features(&self) -> usize {
        self.mean.len()
    }

    fn transform(&self, features: &Array1<f64>) -> Result<Array1<f64>, PredictError> {
        if features.len() != self.n_features() {
            return Err(PredictError::DimensionMismatch {
                expected: self.n_features(),
                actual: features.len(),
            });
        }

        let scaled = features
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(&x, (&mean, &scale))| {
                let centered = if self.with_mean { x - mean } else { x };
                // Constant features were fitted with zero variance
                let divisor = if !self.with_std || scale == 0.0 { 1.0 } else { scale };
                centered / divisor
            })
            .collect::<Array1<f64>>();

        Ok(scaled)
    }
}
