//! Startup configuration
//!
//! All settings are read once when the process starts and are immutable afterwards.
//! [`GatewayConfig::from_lookup`] takes any key lookup so tests can build a config
//! without touching the process environment.

use crate::{Error, Result};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8084";
pub const DEFAULT_TOKEN_TTL_MINUTES: u64 = 15;
pub const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
pub const DEFAULT_MAX_DEPTH: usize = 8;
pub const DEFAULT_MAX_COMPLEXITY: usize = 512;

/// Gateway configuration
#[derive(Clone)]
pub struct GatewayConfig {
    /// Listen address
    pub bind_addr: SocketAddr,
    /// Base address of the admin service (no trailing slash)
    pub admin_service_url: String,
    /// Base address of the feedback service (no trailing slash)
    pub feedback_service_url: String,
    /// HS256 shared secret
    pub jwt_secret: String,
    /// Clock skew tolerated when checking `exp`
    pub jwt_leeway: Duration,
    /// Lifetime stamped on issued credentials
    pub token_ttl: Duration,
    /// Whole-request bound on every downstream call
    pub upstream_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_body_bytes: usize,
    pub graphql_max_depth: usize,
    pub graphql_max_complexity: usize,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("bind_addr", &self.bind_addr)
            .field("admin_service_url", &self.admin_service_url)
            .field("feedback_service_url", &self.feedback_service_url)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_leeway", &self.jwt_leeway)
            .field("token_ttl", &self.token_ttl)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("graphql_max_depth", &self.graphql_max_depth)
            .field("graphql_max_complexity", &self.graphql_max_complexity)
            .finish()
    }
}

impl GatewayConfig {
    /// Config with defaults for everything but the two service addresses and the secret.
    pub fn new(
        admin_service_url: impl Into<String>,
        feedback_service_url: impl Into<String>,
        jwt_secret: impl Into<String>,
    ) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8084)),
            admin_service_url: normalize_base_url(&admin_service_url.into()),
            feedback_service_url: normalize_base_url(&feedback_service_url.into()),
            jwt_secret: jwt_secret.into(),
            jwt_leeway: Duration::ZERO,
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_MINUTES * 60),
            upstream_timeout: Duration::from_millis(DEFAULT_UPSTREAM_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            graphql_max_depth: DEFAULT_MAX_DEPTH,
            graphql_max_complexity: DEFAULT_MAX_COMPLEXITY,
        }
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| {
            get(key).ok_or_else(|| Error::Config(format!("{key} must be set")))
        };

        let admin_service_url = parse_base_url("ADMIN_SERVICE_URL", &required("ADMIN_SERVICE_URL")?)?;
        let feedback_service_url =
            parse_base_url("FEEDBACK_SERVICE_URL", &required("FEEDBACK_SERVICE_URL")?)?;
        let jwt_secret = required("JWT_SECRET_KEY")?;

        let bind_addr = parse_or(
            "GATEWAY_BIND_ADDR",
            get("GATEWAY_BIND_ADDR"),
            SocketAddr::from(([0, 0, 0, 0], 8084)),
        )?;
        let leeway_secs: u64 = parse_or("JWT_LEEWAY_SECS", get("JWT_LEEWAY_SECS"), 0)?;
        let ttl_minutes: u64 = parse_or(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            get("ACCESS_TOKEN_EXPIRE_MINUTES"),
            DEFAULT_TOKEN_TTL_MINUTES,
        )?;
        let timeout_ms: u64 = parse_or(
            "UPSTREAM_TIMEOUT_MS",
            get("UPSTREAM_TIMEOUT_MS"),
            DEFAULT_UPSTREAM_TIMEOUT_MS,
        )?;
        let connect_ms: u64 = parse_or(
            "UPSTREAM_CONNECT_TIMEOUT_MS",
            get("UPSTREAM_CONNECT_TIMEOUT_MS"),
            DEFAULT_CONNECT_TIMEOUT_MS,
        )?;
        let max_body_bytes: usize =
            parse_or("MAX_BODY_BYTES", get("MAX_BODY_BYTES"), DEFAULT_MAX_BODY_BYTES)?;
        let graphql_max_depth: usize =
            parse_or("GRAPHQL_MAX_DEPTH", get("GRAPHQL_MAX_DEPTH"), DEFAULT_MAX_DEPTH)?;
        let graphql_max_complexity: usize = parse_or(
            "GRAPHQL_MAX_COMPLEXITY",
            get("GRAPHQL_MAX_COMPLEXITY"),
            DEFAULT_MAX_COMPLEXITY,
        )?;

        let token_ttl = ttl_minutes
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| {
                Error::Config(format!(
                    "ACCESS_TOKEN_EXPIRE_MINUTES is out of range: {ttl_minutes}"
                ))
            })?;

        let config = Self {
            bind_addr,
            admin_service_url,
            feedback_service_url,
            jwt_secret,
            jwt_leeway: Duration::from_secs(leeway_secs),
            token_ttl,
            upstream_timeout: Duration::from_millis(timeout_ms),
            connect_timeout: Duration::from_millis(connect_ms),
            max_body_bytes,
            graphql_max_depth,
            graphql_max_complexity,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the gateway hang or refuse every request.
    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.is_empty() {
            return Err(Error::Config("JWT_SECRET_KEY must not be empty".into()));
        }
        if self.upstream_timeout.is_zero() {
            return Err(Error::Config("UPSTREAM_TIMEOUT_MS must be positive".into()));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::Config(
                "UPSTREAM_CONNECT_TIMEOUT_MS must be positive".into(),
            ));
        }
        if self.token_ttl.is_zero() {
            return Err(Error::Config(
                "ACCESS_TOKEN_EXPIRE_MINUTES must be positive".into(),
            ));
        }
        if self.max_body_bytes == 0 {
            return Err(Error::Config("MAX_BODY_BYTES must be positive".into()));
        }
        if self.graphql_max_depth == 0 || self.graphql_max_complexity == 0 {
            return Err(Error::Config("GraphQL limits must be positive".into()));
        }
        Ok(())
    }

    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("{key}: invalid value {raw:?}: {e}"))),
    }
}

fn parse_base_url(key: &str, raw: &str) -> Result<String> {
    let url = reqwest::Url::parse(raw)
        .map_err(|e| Error::Config(format!("{key}: invalid URL {raw:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "{key}: unsupported scheme {:?}",
            url.scheme()
        )));
    }
    Ok(normalize_base_url(raw))
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim_end_matches('/').to_string()
}
