//! Configuration for the registration service.

use crate::service::ServiceSettings;
use anyhow::{ensure, Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Cost range bcrypt accepts.
const BCRYPT_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

/// Service configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Identifier hashing configuration
    pub identity: IdentityConfig,

    /// Store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// OTP configuration
    #[serde(default)]
    pub otp: OtpConfig,

    /// Password hashing configuration
    #[serde(default)]
    pub password: PasswordConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize)]
pub struct IdentityConfig {
    /// HMAC key for Aadhaar hashing. Also keys the snapshot file.
    pub secret: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// `memory://`, `file:///path` or a bare path
    #[serde(default = "default_store_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    /// Passcode validity window
    #[serde(default = "default_otp_ttl", with = "humantime_serde")]
    pub ttl: Duration,

    /// Echo the passcode in the issue response. Development only.
    #[serde(default)]
    pub expose_in_response: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Global requests per minute
    #[serde(default = "default_global_rpm")]
    pub global_per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of text
    #[serde(default)]
    pub json: bool,
}

impl ServerConfig {
    /// Address to bind.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .listen_addr
            .parse()
            .with_context(|| format!("Invalid SERVER__LISTEN_ADDR: {}", self.listen_addr))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
        }
    }
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl: default_otp_ttl(),
            expose_in_response: false,
        }
    }
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global_per_minute: default_global_rpm(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_store_url() -> String {
    "file:///data/identity-registration.enc".into()
}

fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    5000
}

fn default_otp_ttl() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_bcrypt_cost() -> u32 {
    10
}

fn default_global_rpm() -> u32 {
    60
}

fn default_log_level() -> String {
    "info".into()
}

/// Flat variables accepted as fallbacks for the namespaced ones.
const LEGACY_VARS: &[(&str, &str)] = &[
    ("AADHAAR_SECRET", "identity.secret"),
    ("STORE_URL", "store.url"),
    ("PORT", "server.port"),
];

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_vars(std::env::vars().collect())
    }

    /// Build configuration from an explicit variable map.
    ///
    /// Namespaced variables (`SERVER__PORT`) take precedence over the flat
    /// fallbacks (`PORT`).
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        let mut builder = config::Config::builder();

        for (var, key) in LEGACY_VARS {
            if let Some(value) = vars.get(*var) {
                builder = builder
                    .set_default(*key, value.as_str())
                    .with_context(|| format!("Invalid value for {}", var))?;
            }
        }

        let config = builder
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(false)
                    .source(Some(vars.into_iter().collect())),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail once requests arrive.
    fn validate(&self) -> Result<()> {
        ensure!(
            BCRYPT_COST_RANGE.contains(&self.password.bcrypt_cost),
            "PASSWORD__BCRYPT_COST must be between {} and {}, got {}",
            BCRYPT_COST_RANGE.start(),
            BCRYPT_COST_RANGE.end(),
            self.password.bcrypt_cost
        );
        self.server.socket_addr()?;
        Ok(())
    }

    /// Settings for the registration flow.
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            otp_ttl: self.otp.ttl,
            bcrypt_cost: self.password.bcrypt_cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(vars(&[("IDENTITY__SECRET", "s3cret")])).unwrap();

        assert_eq!(config.identity.secret.expose_secret(), "s3cret");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.listen_addr, "0.0.0.0");
        assert_eq!(config.store.url, "file:///data/identity-registration.enc");
        assert_eq!(config.otp.ttl, Duration::from_secs(300));
        assert!(!config.otp.expose_in_response);
        assert_eq!(config.password.bcrypt_cost, 10);
        assert_eq!(config.rate_limit.global_per_minute, 60);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_missing_secret_fails() {
        assert!(Config::from_vars(vars(&[("PORT", "8080")])).is_err());
    }

    #[test]
    fn test_legacy_variables() {
        let config = Config::from_vars(vars(&[
            ("AADHAAR_SECRET", "legacy"),
            ("STORE_URL", "memory://"),
            ("PORT", "8080"),
        ]))
        .unwrap();

        assert_eq!(config.identity.secret.expose_secret(), "legacy");
        assert_eq!(config.store.url, "memory://");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_namespaced_variables_win() {
        let config = Config::from_vars(vars(&[
            ("AADHAAR_SECRET", "legacy"),
            ("IDENTITY__SECRET", "namespaced"),
            ("PORT", "8080"),
            ("SERVER__PORT", "9090"),
            ("OTP__TTL", "90s"),
            ("OTP__EXPOSE_IN_RESPONSE", "true"),
            ("PASSWORD__BCRYPT_COST", "12"),
        ]))
        .unwrap();

        assert_eq!(config.identity.secret.expose_secret(), "namespaced");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.otp.ttl, Duration::from_secs(90));
        assert!(config.otp.expose_in_response);

        let settings = config.service_settings();
        assert_eq!(settings.bcrypt_cost, 12);
        assert_eq!(settings.otp_ttl, Duration::from_secs(90));
    }

    #[test]
    fn test_bcrypt_cost_out_of_range_fails() {
        for cost in ["3", "32"] {
            let result = Config::from_vars(vars(&[
                ("IDENTITY__SECRET", "s3cret"),
                ("PASSWORD__BCRYPT_COST", cost),
            ]));
            assert!(result.is_err(), "cost {} accepted", cost);
        }
    }

    #[test]
    fn test_bcrypt_cost_bounds_accepted() {
        for cost in ["4", "31"] {
            let config = Config::from_vars(vars(&[
                ("IDENTITY__SECRET", "s3cret"),
                ("PASSWORD__BCRYPT_COST", cost),
            ]))
            .unwrap();
            assert_eq!(config.password.bcrypt_cost.to_string(), cost);
        }
    }

    #[test]
    fn test_invalid_listen_addr_fails() {
        let result = Config::from_vars(vars(&[
            ("IDENTITY__SECRET", "s3cret"),
            ("SERVER__LISTEN_ADDR", "0.0.0.o"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = Config::from_vars(vars(&[
            ("IDENTITY__SECRET", "s3cret"),
            ("SERVER__LISTEN_ADDR", "127.0.0.1"),
            ("SERVER__PORT", "8081"),
        ]))
        .unwrap();
        assert_eq!(
            config.server.socket_addr().unwrap(),
            "127.0.0.1:8081".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_secret_not_in_debug_output() {
        let config = Config::from_vars(vars(&[("IDENTITY__SECRET", "hunter2")])).unwrap();
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
