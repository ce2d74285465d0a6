//! Service configuration
//!
//! Settings come from `ONBOARD_*` environment variables, with defaults for
//! everything. Tests build configurations with the `with_*` methods instead.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Default device name prefix
pub const DEFAULT_DEVICE_PREFIX: &str = "CS-CORD-DK-";

/// Default trust anchor location
pub const DEFAULT_TRUST_ANCHOR_PATH: &str = "./MCHP_manifest_signer.crt";

pub const DEFAULT_DEVICE_POLICY: &str = "device-policy";
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings the provisioning pipeline needs per entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Prepended to each verified `uniqueId` to form the device name
    pub device_prefix: String,

    /// Policy attached to every registered certificate
    pub policy_name: String,

    /// Upper bound for each individual gateway call
    pub gateway_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            device_prefix: DEFAULT_DEVICE_PREFIX.into(),
            policy_name: DEFAULT_DEVICE_POLICY.into(),
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }
}

impl PipelineConfig {
    pub fn with_device_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.device_prefix = prefix.into();
        self
    }

    pub fn with_policy_name(mut self, policy_name: impl Into<String>) -> Self {
        self.policy_name = policy_name.into();
        self
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    /// Gateway timeout in milliseconds, saturating at `u64::MAX`
    pub fn gateway_timeout_ms(&self) -> u64 {
        u64::try_from(self.gateway_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// PEM or DER certificate of the manifest signer
    pub trust_anchor_path: PathBuf,

    pub pipeline: PipelineConfig,

    pub port: u16,

    /// Request body limit for manifest uploads
    pub max_body_bytes: usize,

    /// Tracing level name (`trace` ... `error`)
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            trust_anchor_path: PathBuf::from(DEFAULT_TRUST_ANCHOR_PATH),
            pipeline: PipelineConfig::default(),
            port: DEFAULT_PORT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            log_level: "info".into(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through a variable lookup function
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("ONBOARD_TRUST_ANCHOR_PATH") {
            config.trust_anchor_path = PathBuf::from(path);
        }
        if let Some(policy) = lookup("ONBOARD_DEVICE_POLICY") {
            if policy.is_empty() {
                return Err(ConfigError::Invalid {
                    var: "ONBOARD_DEVICE_POLICY",
                    value: policy,
                    reason: "policy name must not be empty".into(),
                });
            }
            config.pipeline.policy_name = policy;
        }
        if let Some(prefix) = lookup("ONBOARD_DEVICE_PREFIX") {
            config.pipeline.device_prefix = prefix;
        }
        if let Some(ms) = lookup("ONBOARD_GATEWAY_TIMEOUT_MS") {
            let millis: u64 = parse_var("ONBOARD_GATEWAY_TIMEOUT_MS", &ms)?;
            if millis == 0 {
                return Err(ConfigError::Invalid {
                    var: "ONBOARD_GATEWAY_TIMEOUT_MS",
                    value: ms,
                    reason: "timeout must be positive".into(),
                });
            }
            config.pipeline.gateway_timeout = Duration::from_millis(millis);
        }
        if let Some(port) = lookup("ONBOARD_PORT") {
            config.port = parse_var("ONBOARD_PORT", &port)?;
        }
        if let Some(bytes) = lookup("ONBOARD_MAX_BODY_BYTES") {
            config.max_body_bytes = parse_var("ONBOARD_MAX_BODY_BYTES", &bytes)?;
        }
        if let Some(level) = lookup("ONBOARD_LOG_LEVEL") {
            if let Err(e) = EnvFilter::try_new(&level) {
                return Err(ConfigError::Invalid {
                    var: "ONBOARD_LOG_LEVEL",
                    value: level,
                    reason: e.to_string(),
                });
            }
            config.log_level = level;
        }

        Ok(config)
    }

    /// Log filter built from `log_level`
    ///
    /// Accepts a bare level (`debug`) or per-target directives
    /// (`onboard_service=debug,tower_http=info`).
    pub fn log_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    }

    pub fn with_trust_anchor_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.trust_anchor_path = path.into();
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

fn parse_var<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.pipeline.device_prefix, "CS-CORD-DK-");
        assert_eq!(config.pipeline.gateway_timeout, Duration::from_secs(5));
        assert_eq!(
            config.trust_anchor_path,
            PathBuf::from("./MCHP_manifest_signer.crt")
        );
        assert_eq!(config.max_body_bytes, 1_048_576);
    }

    #[test]
    fn test_overrides() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("ONBOARD_TRUST_ANCHOR_PATH", "/etc/onboard/signer.pem"),
            ("ONBOARD_DEVICE_POLICY", "fleet-policy"),
            ("ONBOARD_DEVICE_PREFIX", "LAB-"),
            ("ONBOARD_GATEWAY_TIMEOUT_MS", "750"),
            ("ONBOARD_PORT", "9443"),
            ("ONBOARD_MAX_BODY_BYTES", "4096"),
            ("ONBOARD_LOG_LEVEL", "debug"),
        ]))
        .unwrap();

        assert_eq!(config.trust_anchor_path, PathBuf::from("/etc/onboard/signer.pem"));
        assert_eq!(config.pipeline.policy_name, "fleet-policy");
        assert_eq!(config.pipeline.device_prefix, "LAB-");
        assert_eq!(config.pipeline.gateway_timeout, Duration::from_millis(750));
        assert_eq!(config.port, 9443);
        assert_eq!(config.max_body_bytes, 4096);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            ("ONBOARD_PORT", "http"),
            ("ONBOARD_PORT", "70000"),
            ("ONBOARD_GATEWAY_TIMEOUT_MS", "-1"),
            ("ONBOARD_GATEWAY_TIMEOUT_MS", "0"),
            ("ONBOARD_MAX_BODY_BYTES", "lots"),
            ("ONBOARD_DEVICE_POLICY", ""),
            ("ONBOARD_LOG_LEVEL", "onboard_service=loud"),
        ];
        for (var, value) in cases {
            match ServiceConfig::from_lookup(lookup(&[(var, value)])) {
                Err(ConfigError::Invalid { var: v, .. }) => assert_eq!(v, var),
                other => panic!("{}={} accepted: {:?}", var, value, other),
            }
        }
    }

    #[test]
    fn test_log_filter_directives() {
        let config = ServiceConfig::from_lookup(lookup(&[(
            "ONBOARD_LOG_LEVEL",
            "onboard_service=debug,tower_http=info",
        )]))
        .unwrap();
        assert_eq!(config.log_level, "onboard_service=debug,tower_http=info");

        let filter = config.log_filter().to_string();
        assert!(filter.contains("onboard_service=debug"));
        assert!(filter.contains("tower_http=info"));
    }

    #[test]
    fn test_gateway_timeout_ms() {
        let config = PipelineConfig::default();
        assert_eq!(config.gateway_timeout_ms(), 5000);

        let config = config.with_gateway_timeout(Duration::MAX);
        assert_eq!(config.gateway_timeout_ms(), u64::MAX);
    }

    #[test]
    fn test_builders() {
        let config = ServiceConfig::default()
            .with_port(0)
            .with_max_body_bytes(10)
            .with_trust_anchor_path("anchor.der")
            .with_pipeline(
                PipelineConfig::default()
                    .with_device_prefix("X-")
                    .with_policy_name("p")
                    .with_gateway_timeout(Duration::from_millis(1)),
            );
        assert_eq!(config.port, 0);
        assert_eq!(config.pipeline.device_prefix, "X-");
        assert_eq!(config.pipeline.gateway_timeout, Duration::from_millis(1));
    }
}
