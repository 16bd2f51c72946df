use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_V1_KEYS_URL: &str = "https://login.microsoftonline.com/common/discovery/keys";
pub const DEFAULT_V2_KEYS_URL: &str = "https://login.microsoftonline.com/common/discovery/v2.0/keys";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub identity: IdentityConfig,
    pub cache: CacheConfig,
    pub endpoint_defaults: EndpointConfig,
    /// Per-endpoint overrides keyed by operation name.
    #[serde(default)]
    pub endpoints: HashMap<String, EndpointConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub service_name: String,
    /// Also enforce `(subject, path, method)` rules at the HTTP layer.
    #[serde(default)]
    pub route_authorization: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub client_id: String,
    pub scope: String,
    pub client_id_claim: String,
    pub scope_claim: String,
    pub subject_claim: String,
    pub v1_keys_url: String,
    pub v2_keys_url: String,
    pub key_fetch_timeout_seconds: u64,
    #[serde(default)]
    pub scope_match: ScopeMatch,
}

/// How the configured scope is compared with the token's scope claim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMatch {
    /// The whole claim must equal the configured scope.
    #[default]
    Exact,
    /// The configured scope must be one of the space separated entries.
    Contains,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_size: usize,
    pub default_ttl_seconds: u64,
    pub write_timeout_ms: u64,
    pub enable_stats: bool,
    #[serde(default)]
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub rate_limit: RateLimitConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub cacheable: bool,
    pub cache_ttl_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Bucket capacity, and the number of calls admitted back to back.
    pub burst: u32,
    /// One token is added back every interval.
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub consecutive_failures: u32,
    /// Optional ratio trip, evaluated once `min_requests` calls were seen in
    /// the current counting interval.
    #[serde(default)]
    pub failure_ratio: Option<f64>,
    pub min_requests: u32,
    /// Length of a counting interval while closed; 0 never resets counts.
    pub interval_ms: u64,
    /// Time spent open before a trial call is admitted.
    pub cooldown_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            identity: IdentityConfig::default(),
            cache: CacheConfig::default(),
            endpoint_defaults: EndpointConfig::default(),
            endpoints: HashMap::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            service_name: "microkit".to_string(),
            route_authorization: false,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            scope: String::new(),
            client_id_claim: "appid".to_string(),
            scope_claim: "scp".to_string(),
            subject_claim: "oid".to_string(),
            v1_keys_url: DEFAULT_V1_KEYS_URL.to_string(),
            v2_keys_url: DEFAULT_V2_KEYS_URL.to_string(),
            key_fetch_timeout_seconds: 10,
            scope_match: ScopeMatch::Exact,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 1000,
            default_ttl_seconds: 60,
            write_timeout_ms: 5000,
            enable_stats: true,
            redis_url: None,
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            cacheable: false,
            cache_ttl_ms: 60_000,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: 100,
            interval_ms: 10,
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            consecutive_failures: 5,
            failure_ratio: None,
            min_requests: 10,
            interval_ms: 60_000,
            cooldown_ms: 30_000,
        }
    }
}

impl RateLimitConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl CircuitBreakerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl CacheConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl IdentityConfig {
    pub fn key_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.key_fetch_timeout_seconds)
    }
}

impl EndpointConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.rate_limit.burst == 0 {
            return Err(ConfigError::Message(format!(
                "Endpoint {}: rate limit burst must be greater than 0",
                name
            )));
        }

        if self.rate_limit.interval_ms == 0 {
            return Err(ConfigError::Message(format!(
                "Endpoint {}: rate limit interval must be greater than 0",
                name
            )));
        }

        if self.circuit_breaker.consecutive_failures == 0 {
            return Err(ConfigError::Message(format!(
                "Endpoint {}: circuit breaker failure threshold must be greater than 0",
                name
            )));
        }

        if let Some(ratio) = self.circuit_breaker.failure_ratio {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(ConfigError::Message(format!(
                    "Endpoint {}: circuit breaker failure ratio must be in (0, 1]",
                    name
                )));
            }
        }

        if self.cacheable && self.cache_ttl_ms == 0 {
            return Err(ConfigError::Message(format!(
                "Endpoint {}: cacheable endpoints need a ttl greater than 0",
                name
            )));
        }

        Ok(())
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Layers defaults, an optional config file (any format the `config`
    /// crate recognises by extension), `APP__`-prefixed environment variables
    /// and the `MICROSOFT_APP_ID` / `MICROSOFT_APP_SCOPE` variables.
    pub fn load_from(file_stem: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name(file_stem).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("identity.client_id", std::env::var("MICROSOFT_APP_ID").ok())?
            .set_override_option("identity.scope", std::env::var("MICROSOFT_APP_SCOPE").ok())?;

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port cannot be 0".to_string()));
        }

        if self.identity.v1_keys_url.is_empty() || self.identity.v2_keys_url.is_empty() {
            return Err(ConfigError::Message(
                "Key discovery URLs cannot be empty".to_string(),
            ));
        }

        if self.identity.subject_claim.is_empty() {
            return Err(ConfigError::Message(
                "Subject claim name cannot be empty".to_string(),
            ));
        }

        if self.identity.client_id.is_empty() {
            tracing::warn!("No client id configured - every token will fail audience checks");
        }

        if self.cache.max_size == 0 {
            return Err(ConfigError::Message(
                "Cache max size must be greater than 0".to_string(),
            ));
        }

        if self.cache.write_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Cache write timeout must be greater than 0".to_string(),
            ));
        }

        self.endpoint_defaults.validate("<defaults>")?;
        for (name, endpoint) in &self.endpoints {
            endpoint.validate(name)?;
        }

        Ok(())
    }

    /// Settings for one operation, falling back to `endpoint_defaults`.
    pub fn endpoint(&self, name: &str) -> EndpointConfig {
        self.endpoints
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.endpoint_defaults.clone())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
