//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::artifacts::{SAGEMAKER_MODEL_DIR, STANDALONE_MODEL_DIR};
use crate::data::RfmFeatures;

/// Where the service is deployed; decides default paths and port
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    /// Plain process or container, artifacts under ./models
    Standalone,
    /// Hosted inference container, artifacts under /opt/ml/model
    Sagemaker,
}

impl Platform {
    pub fn default_model_dir(self) -> PathBuf {
        match self {
            Platform::Standalone => PathBuf::from(STANDALONE_MODEL_DIR),
            Platform::Sagemaker => PathBuf::from(SAGEMAKER_MODEL_DIR),
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Platform::Standalone => 8000,
            Platform::Sagemaker => 8080,
        }
    }
}

/// RFM customer segmentation inference server
#[derive(Parser, Debug)]
#[command(name = "rfm-serve", author, version, about, long_about = None)]
pub struct Args {
    /// Host to bind to
    #[arg(long, env = "RFM_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on (defaults to 8000, or 8080 on sagemaker)
    #[arg(short, long, env = "RFM_PORT")]
    pub port: Option<u16>,

    /// Directory holding kmeans_model.json and scaler.json
    #[arg(short, long, env = "RFM_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Deployment platform
    #[arg(long, env = "RFM_PLATFORM", value_enum, default_value_t = Platform::Standalone)]
    pub platform: Platform,

    /// Score a single customer and exit instead of serving.
    /// Example: --predict "30,10,500.0" for Recency=30, Frequency=10, Monetary=500.0
    #[arg(long)]
    pub predict: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Explicit `--model-dir`, else the platform default
    pub fn model_dir(&self) -> PathBuf {
        self.model_dir
            .clone()
            .unwrap_or_else(|| self.platform.default_model_dir())
    }

    /// Explicit `--port`, then `$PORT`, then the platform default
    pub fn port(&self) -> u16 {
        self.port
            .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()))
            .unwrap_or_else(|| self.platform.default_port())
    }

    /// Host and port to bind; hostnames are resolved by the listener
    pub fn bind_target(&self) -> (&str, u16) {
        (self.host.as_str(), self.port())
    }

    /// Parse RFM values from the predict string
    /// Expected format: "recency,frequency,monetary"
    pub fn parse_rfm_values(&self) -> crate::Result<Option<RfmFeatures>> {
        if let Some(ref predict_str) = self.predict {
            let parts: Vec<&str> = predict_str.split(',').collect();
            if parts.len() != 3 {
                anyhow::bail!("Predict values must be in format 'recency,frequency,monetary'");
            }

            let recency: f64 = parts[0]
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid recency value: {}", parts[0]))?;
            let frequency: f64 = parts[1]
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid frequency value: {}", parts[1]))?;
            let monetary: f64 = parts[2]
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid monetary value: {}", parts[2]))?;

            Ok(Some(RfmFeatures::new(recency, frequency, monetary)))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            host: "127.0.0.1".to_string(),
            port: Some(9000),
            model_dir: None,
            platform: Platform::Standalone,
            predict: None,
            verbose: false,
        }
    }

    #[test]
    fn test_parse_rfm_values() {
        let mut args = base_args();
        args.predict = Some("30, 10,500.0".to_string());

        let result = args.parse_rfm_values().unwrap();
        assert_eq!(result, Some(RfmFeatures::new(30.0, 10.0, 500.0)));

        args.predict = None;
        let result = args.parse_rfm_values().unwrap();
        assert_eq!(result, None);

        args.predict = Some("invalid".to_string());
        assert!(args.parse_rfm_values().is_err());

        args.predict = Some("1,two,3".to_string());
        assert!(args.parse_rfm_values().is_err());
    }

    #[test]
    fn test_platform_defaults() {
        let mut args = base_args();
        assert_eq!(args.model_dir(), PathBuf::from("models"));

        args.platform = Platform::Sagemaker;
        assert_eq!(args.model_dir(), PathBuf::from("/opt/ml/model"));

        args.model_dir = Some(PathBuf::from("/srv/rfm"));
        assert_eq!(args.model_dir(), PathBuf::from("/srv/rfm"));
    }

    #[test]
    fn test_bind_target() {
        let args = base_args();
        assert_eq!(args.bind_target(), ("127.0.0.1", 9000));

        let args =
            Args::try_parse_from(["rfm-serve", "--host", "localhost", "--port", "9001"]).unwrap();
        assert_eq!(args.bind_target(), ("localhost", 9001));
    }

    #[tokio::test]
    async fn test_bind_target_resolves_hostname() {
        let mut args = base_args();
        args.host = "localhost".to_string();
        args.port = Some(0);

        let listener = tokio::net::TcpListener::bind(args.bind_target()).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "rfm-serve",
            "--platform",
            "sagemaker",
            "--port",
            "8081",
            "--predict",
            "5,10,200",
        ])
        .unwrap();
        assert_eq!(args.platform, Platform::Sagemaker);
        assert_eq!(args.port(), 8081);
        assert!(args.parse_rfm_values().unwrap().is_some());
    }
}
