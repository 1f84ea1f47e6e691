//! Server Configuration
//!
//! Loads configuration from environment variables.

use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;

/// Signing secret used when `JWT_SECRET` is unset outside production.
pub const INSECURE_DEFAULT_JWT_SECRET: &str = "foodlink-insecure-dev-secret-change-me";

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "test" => Self::Test,
            _ => Self::Development,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
        }
    }
}

/// Token signing and lifetime settings.
#[derive(Debug, Clone)]
pub struct JwtSettings {
    /// HS256 signing secret
    pub secret: String,

    /// Value of the `iss` claim
    pub issuer: String,

    /// Access token lifetime (default: 24h)
    pub access_expiry: Duration,

    /// Refresh token lifetime (default: 48h)
    pub refresh_expiry: Duration,
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080")
    pub bind_address: String,

    /// Deployment environment
    pub environment: Environment,

    /// `PostgreSQL` connection URL. Unset means the in-process store is used.
    pub database_url: Option<String>,

    /// Maximum pooled connections
    pub db_max_connections: u32,

    /// Connections kept warm
    pub db_min_connections: u32,

    /// Idle connection timeout
    pub db_idle_timeout: Duration,

    /// Maximum connection lifetime
    pub db_max_lifetime: Duration,

    /// Token settings
    pub jwt: JwtSettings,

    /// True when `JWT_SECRET` was unset and the insecure default is in use
    pub insecure_jwt_secret: bool,

    /// Default log level when `RUST_LOG` is unset
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// Empty values are treated as unset.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_first = |keys: &[&str]| keys.iter().find_map(|key| get(*key));

        let environment = get_first(&["ENVIRONMENT", "NODE_ENV"])
            .map_or(Environment::Development, |v| Environment::parse(&v));

        let bind_address = get("BIND_ADDRESS").unwrap_or_else(|| {
            let port = get("PORT").unwrap_or_else(|| "8080".into());
            format!("0.0.0.0:{port}")
        });

        let (secret, insecure_jwt_secret) = match get("JWT_SECRET") {
            Some(secret) => (secret, false),
            None if environment == Environment::Production => {
                bail!("JWT_SECRET must be set when ENVIRONMENT=production")
            }
            None => (INSECURE_DEFAULT_JWT_SECRET.to_string(), true),
        };

        let access_raw = get_first(&["JWT_EXPIRY", "JWT_EXPIRES_IN"]).unwrap_or_else(|| "24h".into());
        let refresh_raw = get_first(&["JWT_REFRESH_EXPIRY", "JWT_REFRESH_EXPIRES_IN"])
            .unwrap_or_else(|| "48h".into());

        let access_expiry = positive_expiry(&access_raw).context("Invalid JWT_EXPIRY")?;
        let refresh_expiry =
            positive_expiry(&refresh_raw).context("Invalid JWT_REFRESH_EXPIRY")?;

        Ok(Self {
            bind_address,
            environment,
            database_url: get("DATABASE_URL"),
            db_max_connections: parse_number(get("DB_MAX_POOL_SIZE"), 25)
                .context("Invalid DB_MAX_POOL_SIZE")?,
            db_min_connections: parse_number(get("DB_MIN_CONNECTIONS"), 1)
                .context("Invalid DB_MIN_CONNECTIONS")?,
            db_idle_timeout: Duration::from_millis(
                parse_number(get("DB_IDLE_TIMEOUT_MS"), 600_000)
                    .context("Invalid DB_IDLE_TIMEOUT_MS")?,
            ),
            db_max_lifetime: Duration::from_millis(
                parse_number(get("DB_CONN_MAX_LIFETIME_MS"), 300_000)
                    .context("Invalid DB_CONN_MAX_LIFETIME_MS")?,
            ),
            jwt: JwtSettings {
                secret,
                issuer: get("JWT_ISSUER").unwrap_or_else(|| "foodlink-backend".into()),
                access_expiry,
                refresh_expiry,
            },
            insecure_jwt_secret,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".into()),
        })
    }

    /// Create a default configuration for testing.
    ///
    /// No database URL: tests run against the in-process user store.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".into(),
            environment: Environment::Test,
            database_url: None,
            db_max_connections: 5,
            db_min_connections: 1,
            db_idle_timeout: Duration::from_secs(600),
            db_max_lifetime: Duration::from_secs(300),
            jwt: JwtSettings {
                secret: "test-secret".into(),
                issuer: "foodlink-backend".into(),
                access_expiry: Duration::from_secs(900),
                refresh_expiry: Duration::from_secs(604_800),
            },
            insecure_jwt_secret: false,
            log_level: "debug".into(),
        }
    }
}

/// Parse a token lifetime string.
///
/// Accepts `humantime` durations ("24h", "1h30m", "90s") plus day/week
/// shorthands with fractional counts ("2d", "1.5d", "1w") that are scaled
/// directly.
pub fn parse_expiry(raw: &str) -> Result<Duration> {
    const DAY_SECS: f64 = 24.0 * 60.0 * 60.0;

    let s = raw.trim();
    if s.is_empty() {
        bail!("empty expiry");
    }

    let scaled = s
        .strip_suffix('d')
        .map(|n| (n, DAY_SECS))
        .or_else(|| s.strip_suffix('w').map(|n| (n, 7.0 * DAY_SECS)));

    if let Some((count, unit_secs)) = scaled {
        if let Ok(n) = count.trim().parse::<f64>() {
            if n.is_finite() && n >= 0.0 {
                return Duration::try_from_secs_f64(n * unit_secs)
                    .with_context(|| format!("duration {s:?} out of range"));
            }
        }
        // Not a plain count; humantime decides.
    }

    humantime::parse_duration(s).with_context(|| format!("invalid duration {s:?}"))
}

fn positive_expiry(raw: &str) -> Result<Duration> {
    let expiry = parse_expiry(raw)?;
    if expiry.is_zero() {
        bail!("expiry must be greater than zero");
    }
    // Tokens stamp `exp = now + expiry`; that sum must stay representable.
    let reachable = chrono::Duration::from_std(expiry)
        .ok()
        .and_then(|ttl| Utc::now().checked_add_signed(ttl));
    if reachable.is_none() {
        bail!("expiry {raw:?} is too large");
    }
    Ok(expiry)
}

fn parse_number<T: std::str::FromStr>(raw: Option<String>, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.map_or(Ok(default), |v| v.trim().parse().map_err(Into::into))
}
