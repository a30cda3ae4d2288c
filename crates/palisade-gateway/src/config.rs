//! Configuration for the Palisade gateway.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use palisade_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};
use crate::targets::ProxyTable;

/// Gateway configuration.
///
/// Loaded once at startup from a TOML or JSON file, then environment
/// overrides, then [`GatewayConfig::validate`]. Never changed at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener and forwarding settings.
    pub gateway: GatewaySettings,
    /// Token verification settings.
    pub identity: IdentitySettings,
    /// Policy document settings.
    pub policy: PolicySettings,
    /// Proxy targets, one per backend.
    pub routes: Vec<RouteSettings>,
    /// Telemetry settings.
    pub telemetry: TelemetrySettings,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            gateway: GatewaySettings::default(),
            identity: IdentitySettings::default(),
            policy: PolicySettings::default(),
            routes: RouteSettings::defaults(),
            telemetry: TelemetrySettings::default(),
        }
    }
}

impl GatewayConfig {
    /// Create a new configuration builder.
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::default()
    }

    /// Load configuration from a file.
    pub fn from_file(path: impl Into<PathBuf>) -> GatewayResult<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            GatewayError::config(format!(
                "failed to read config file '{}': {e}",
                path.display()
            ))
        })?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        match extension {
            "toml" => toml::from_str(&content)
                .map_err(|e| GatewayError::config(format!("invalid TOML: {e}"))),
            "json" => serde_json::from_str(&content)
                .map_err(|e| GatewayError::config(format!("invalid JSON: {e}"))),
            _ => Err(GatewayError::config(format!(
                "unsupported config format: {extension}"
            ))),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Environment variables are prefixed with `PALISADE_` and use uppercase
    /// `snake_case`. A route's target is overridden by
    /// `PALISADE_ROUTE_<NAME>_URL`.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(port) = var("PALISADE_LISTEN_PORT").and_then(|v| v.parse().ok()) {
            self.gateway.listen_port = port;
        }

        if let Some(secs) = var("PALISADE_UPSTREAM_TIMEOUT").and_then(|v| v.parse::<u64>().ok()) {
            self.gateway.upstream_timeout = Duration::from_secs(secs);
        }

        if let Some(path) = var("PALISADE_PUBLIC_KEY_PATH") {
            self.identity.public_key_path = PathBuf::from(path);
        }

        if let Some(path) = var("PALISADE_POLICY_PATH") {
            self.policy.path = Some(PathBuf::from(path));
        }

        if let Some(port) = var("PALISADE_METRICS_PORT").and_then(|v| v.parse().ok()) {
            self.telemetry.metrics_port = port;
        }

        if let Some(level) = var("PALISADE_LOG_LEVEL") {
            self.telemetry.log_level = level;
        }

        for route in &mut self.routes {
            if let Some(url) = var(&route.env_key()) {
                route.target = url;
            }
        }

        self
    }

    /// Validate the configuration.
    ///
    /// Also compiles the route table, so overlapping prefixes and bad target
    /// URLs are reported here.
    pub fn validate(&self) -> GatewayResult<()> {
        self.gateway
            .listen_addr
            .parse::<IpAddr>()
            .map_err(|e| GatewayError::config(format!("invalid listen_addr: {e}")))?;

        if self.gateway.upstream_timeout.is_zero() {
            return Err(GatewayError::config("upstream_timeout must be non-zero"));
        }

        if self.gateway.max_request_body_size == 0 {
            return Err(GatewayError::config(
                "max_request_body_size must be non-zero",
            ));
        }

        if self.routes.is_empty() {
            return Err(GatewayError::config("at least one route is required"));
        }

        ProxyTable::new(&self.routes).map(|_| ())
    }

    /// The telemetry settings in the form the telemetry crate expects.
    pub fn telemetry_config(&self) -> TelemetryConfig {
        let telemetry = &self.telemetry;
        let builder = TelemetryConfig::builder()
            .service_name(&telemetry.service_name)
            .log_level(&telemetry.log_level)
            .json_logs(telemetry.json_logs);

        if telemetry.metrics_enabled {
            builder
                .metrics_addr(&format!("0.0.0.0:{}", telemetry.metrics_port))
                .build()
        } else {
            builder.without_metrics().build()
        }
    }
}

/// Listener and forwarding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Port the gateway listens on.
    pub listen_port: u16,
    /// Address to bind to.
    pub listen_addr: String,
    /// Timeout for a backend to start responding.
    #[serde(with = "humantime_serde")]
    pub upstream_timeout: Duration,
    /// Maximum request body size in bytes.
    pub max_request_body_size: usize,
    /// Retries after a connection failure, idempotent methods only.
    pub max_retries: u32,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            listen_port: 8080,
            listen_addr: "0.0.0.0".to_string(),
            upstream_timeout: Duration::from_secs(30),
            max_request_body_size: 10 * 1024 * 1024, // 10MB
            max_retries: 1,
        }
    }
}

/// Token verification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    /// PEM-encoded RSA public key of the identity provider.
    pub public_key_path: PathBuf,
    /// Expected `iss` claim; unchecked when absent.
    pub issuer: Option<String>,
    /// Clock skew tolerated on `exp` and `nbf`.
    pub leeway_seconds: u64,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            public_key_path: PathBuf::from("../secrets/jwtRS256.key.pub"),
            issuer: None,
            leeway_seconds: 0,
        }
    }
}

/// Policy document settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    /// Policy document (TOML or JSON). The built-in policy is used when absent.
    pub path: Option<PathBuf>,
}

/// A proxy target: every path under `prefix` goes to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSettings {
    /// Route name, used in logs, metrics and the env override key.
    pub name: String,
    /// Path prefix, matched on whole segments and stripped before forwarding.
    pub prefix: String,
    /// Backend base URL.
    pub target: String,
}

impl RouteSettings {
    /// Create a route.
    pub fn new(
        name: impl Into<String>,
        prefix: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            target: target.into(),
        }
    }

    /// The environment variable overriding this route's target.
    pub fn env_key(&self) -> String {
        let name: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("PALISADE_ROUTE_{name}_URL")
    }

    /// The five backend services of the default deployment.
    pub fn defaults() -> Vec<Self> {
        [
            ("users", "http://user-service:3000"),
            ("content", "http://content-service:3001"),
            ("ugc", "http://ugc-service:3002"),
            ("qna", "http://qna-service:3003"),
            ("gamification", "http://gamification-service:3004"),
        ]
        .into_iter()
        .map(|(name, target)| Self::new(name, format!("/api/{name}"), target))
        .collect()
    }
}

/// Telemetry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Service name for telemetry.
    pub service_name: String,
    /// Log filter directive.
    pub log_level: String,
    /// JSON log lines instead of human-readable ones.
    pub json_logs: bool,
    /// Serve Prometheus metrics.
    pub metrics_enabled: bool,
    /// Prometheus metrics port.
    pub metrics_port: u16,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            service_name: "palisade-gateway".to_string(),
            log_level: "info".to_string(),
            json_logs: true,
            metrics_enabled: true,
            metrics_port: 9090,
        }
    }
}

/// Builder for `GatewayConfig`.
#[derive(Debug, Default)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    /// Set the listen port.
    #[must_use]
    pub fn listen_port(mut self, port: u16) -> Self {
        self.config.gateway.listen_port = port;
        self
    }

    /// Set the listen address.
    #[must_use]
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.gateway.listen_addr = addr.into();
        self
    }

    /// Set the upstream timeout.
    #[must_use]
    pub fn upstream_timeout(mut self, timeout: Duration) -> Self {
        self.config.gateway.upstream_timeout = timeout;
        self
    }

    /// Set the maximum request body size.
    #[must_use]
    pub fn max_request_body_size(mut self, bytes: usize) -> Self {
        self.config.gateway.max_request_body_size = bytes;
        self
    }

    /// Set the retry count for idempotent requests.
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.gateway.max_retries = retries;
        self
    }

    /// Set the public key path.
    #[must_use]
    pub fn public_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.identity.public_key_path = path.into();
        self
    }

    /// Set the expected token issuer.
    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.config.identity.issuer = Some(issuer.into());
        self
    }

    /// Set the policy document path.
    #[must_use]
    pub fn policy_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.policy.path = Some(path.into());
        self
    }

    /// Replace the route table.
    #[must_use]
    pub fn routes(mut self, routes: Vec<RouteSettings>) -> Self {
        self.config.routes = routes;
        self
    }

    /// Add a route.
    #[must_use]
    pub fn route(mut self, route: RouteSettings) -> Self {
        self.config.routes.push(route);
        self
    }

    /// Set the metrics port.
    #[must_use]
    pub fn metrics_port(mut self, port: u16) -> Self {
        self.config.telemetry.metrics_port = port;
        self
    }

    /// Disable the metrics exporter.
    #[must_use]
    pub fn without_metrics(mut self) -> Self {
        self.config.telemetry.metrics_enabled = false;
        self
    }

    /// Set the service name.
    #[must_use]
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.config.telemetry.service_name = name.into();
        self
    }

    /// Build the configuration.
    pub fn build(self) -> GatewayResult<GatewayConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Custom deserializer for Duration using humantime format.
mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        let invalid = || format!("invalid duration: '{s}'");
        let number = |n: &str| n.trim().parse::<u64>().map_err(|_| invalid());

        if let Some(n) = s.strip_suffix("ms") {
            Ok(Duration::from_millis(number(n)?))
        } else if let Some(n) = s.strip_suffix('s') {
            Ok(Duration::from_secs(number(n)?))
        } else if let Some(n) = s.strip_suffix('m') {
            scaled(number(n)?, 60).ok_or_else(invalid)
        } else if let Some(n) = s.strip_suffix('h') {
            scaled(number(n)?, 3600).ok_or_else(invalid)
        } else {
            // Assume seconds
            Ok(Duration::from_secs(number(s)?))
        }
    }

    fn scaled(n: u64, unit_secs: u64) -> Option<Duration> {
        n.checked_mul(unit_secs).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.gateway.listen_port, 8080);
        assert_eq!(config.gateway.upstream_timeout, Duration::from_secs(30));
        assert_eq!(config.gateway.max_request_body_size, 10 * 1024 * 1024);
        assert_eq!(config.gateway.max_retries, 1);
        assert_eq!(
            config.identity.public_key_path,
            PathBuf::from("../secrets/jwtRS256.key.pub")
        );
        assert_eq!(config.routes.len(), 5);
        assert_eq!(config.routes[0].prefix, "/api/users");
        assert_eq!(config.routes[4].target, "http://gamification-service:3004");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = GatewayConfig::builder()
            .listen_port(9000)
            .upstream_timeout(Duration::from_secs(5))
            .max_retries(0)
            .routes(vec![RouteSettings::new("app", "/app", "http://app:3000")])
            .build()
            .unwrap();

        assert_eq!(config.gateway.listen_port, 9000);
        assert_eq!(config.gateway.upstream_timeout, Duration::from_secs(5));
        assert_eq!(config.gateway.max_retries, 0);
        assert_eq!(config.routes.len(), 1);
    }

    #[test]
    fn test_config_validation() {
        let config = GatewayConfig::builder().listen_addr("not-an-ip").build();
        assert!(config.is_err());

        let config = GatewayConfig::builder()
            .upstream_timeout(Duration::ZERO)
            .build();
        assert!(config.is_err());

        let config = GatewayConfig::builder().routes(Vec::new()).build();
        assert!(config.is_err());

        let config = GatewayConfig::builder()
            .route(RouteSettings::new("nested", "/api/users/admin", "http://admin:4000"))
            .build();
        assert!(matches!(config, Err(GatewayError::Route { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PALISADE_LISTEN_PORT", "9999"),
            ("PALISADE_UPSTREAM_TIMEOUT", "7"),
            ("PALISADE_PUBLIC_KEY_PATH", "/etc/palisade/key.pub"),
            ("PALISADE_LOG_LEVEL", "debug"),
            ("PALISADE_ROUTE_QNA_URL", "http://localhost:4003"),
            ("PALISADE_METRICS_PORT", "not-a-port"),
        ]
        .into_iter()
        .collect();

        let config = GatewayConfig::default()
            .apply_overrides(|key| vars.get(key).map(ToString::to_string));

        assert_eq!(config.gateway.listen_port, 9999);
        assert_eq!(config.gateway.upstream_timeout, Duration::from_secs(7));
        assert_eq!(
            config.identity.public_key_path,
            PathBuf::from("/etc/palisade/key.pub")
        );
        assert_eq!(config.telemetry.log_level, "debug");
        assert_eq!(config.telemetry.metrics_port, 9090);

        let qna = config.routes.iter().find(|r| r.name == "qna").unwrap();
        assert_eq!(qna.target, "http://localhost:4003");
    }

    #[test]
    fn test_route_env_key() {
        let route = RouteSettings::new("user-files", "/files", "http://files:80");
        assert_eq!(route.env_key(), "PALISADE_ROUTE_USER_FILES_URL");
    }

    #[test]
    fn test_toml_config() {
        let toml = r#"
[gateway]
listen_port = 8081
upstream_timeout = "1500ms"

[identity]
public_key_path = "/keys/jwt.pub"
issuer = "auth-service"

[[routes]]
name = "users"
prefix = "/api/users"
target = "http://localhost:3000"

[telemetry]
service_name = "test-gateway"
json_logs = false
"#;
        let config: GatewayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.gateway.listen_port, 8081);
        assert_eq!(config.gateway.upstream_timeout, Duration::from_millis(1500));
        assert_eq!(config.gateway.max_retries, 1);
        assert_eq!(config.identity.issuer.as_deref(), Some("auth-service"));
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.telemetry.service_name, "test-gateway");
        assert!(!config.telemetry.json_logs);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();

        let json = dir.path().join("gateway.json");
        std::fs::write(
            &json,
            r#"{"gateway": {"listen_port": 9000}, "policy": {"path": "/etc/palisade/policy.toml"}}"#,
        )
        .unwrap();
        let config = GatewayConfig::from_file(&json).unwrap();
        assert_eq!(config.gateway.listen_port, 9000);
        assert_eq!(
            config.policy.path,
            Some(PathBuf::from("/etc/palisade/policy.toml"))
        );
        assert_eq!(config.routes.len(), 5);

        let yaml = dir.path().join("gateway.yaml");
        std::fs::write(&yaml, "gateway: {}").unwrap();
        assert!(matches!(
            GatewayConfig::from_file(&yaml),
            Err(GatewayError::Config { .. })
        ));

        assert!(GatewayConfig::from_file(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_parse_duration() {
        use humantime_serde::parse_duration;

        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert_eq!(parse_duration("45"), Ok(Duration::from_secs(45)));
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration(&format!("{}m", u64::MAX)).is_err());
        assert!(parse_duration(&format!("{}h", u64::MAX / 60)).is_err());
    }

    #[test]
    fn test_telemetry_config() {
        let config = GatewayConfig::builder()
            .service_name("edge")
            .without_metrics()
            .build()
            .unwrap();
        let telemetry = config.telemetry_config();
        assert_eq!(telemetry.service_name, "edge");
        assert!(!telemetry.metrics.enabled);

        let telemetry = GatewayConfig::default().telemetry_config();
        assert!(telemetry.metrics.enabled);
        assert_eq!(telemetry.metrics.addr, "0.0.0.0:9090");
    }
}
