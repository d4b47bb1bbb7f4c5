//! Configuration management

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use venue_common::lifecycle::DEFAULT_CANCELLATION_NOTICE_HOURS;
use venue_common::schedule::{
    BookingPolicy, DEFAULT_HOLD_TIMEOUT_SECS, DEFAULT_MAX_DURATION_MINUTES,
    DEFAULT_MIN_DURATION_MINUTES,
};

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/venue";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

// ============================================================================
// Booking Configuration Constants
// ============================================================================

/// Default upper bound on a payment capture call.
pub const DEFAULT_PAYMENT_TIMEOUT_SECS: u64 = 10;

/// Default interval between expired-hold sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default number of holds expired per sweep batch.
pub const DEFAULT_SWEEP_BATCH_SIZE: i64 = 100;

/// Default requests per minute per client IP.
pub const DEFAULT_RATE_LIMIT_REQUESTS_PER_MINUTE: u64 = 100;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub booking: BookingConfig,
    pub payment: PaymentConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Admission, hold, and cancellation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    pub min_duration_minutes: i64,
    pub max_duration_minutes: i64,
    pub hold_timeout_secs: i64,
    pub pending_blocks: bool,
    pub cancellation_notice_hours: i64,
    pub payment_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub sweep_batch_size: i64,
}

impl BookingConfig {
    pub fn policy(&self) -> BookingPolicy {
        BookingPolicy {
            min_duration_minutes: self.min_duration_minutes,
            max_duration_minutes: self.max_duration_minutes,
            hold_timeout_secs: self.hold_timeout_secs,
            pending_blocks: self.pending_blocks,
        }
    }

    pub fn cancellation_notice(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cancellation_notice_hours)
    }

    pub fn payment_timeout(&self) -> Duration {
        Duration::from_secs(self.payment_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            min_duration_minutes: DEFAULT_MIN_DURATION_MINUTES,
            max_duration_minutes: DEFAULT_MAX_DURATION_MINUTES,
            hold_timeout_secs: DEFAULT_HOLD_TIMEOUT_SECS,
            pending_blocks: true,
            cancellation_notice_hours: DEFAULT_CANCELLATION_NOTICE_HOURS,
            payment_timeout_secs: DEFAULT_PAYMENT_TIMEOUT_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            sweep_batch_size: DEFAULT_SWEEP_BATCH_SIZE,
        }
    }
}

/// Which payment processor backs captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    #[default]
    Mock,
    Http,
}

impl FromStr for PaymentProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "http" | "gateway" => Ok(Self::Http),
            other => Err(anyhow::anyhow!("Unknown payment provider: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PaymentConfig {
    pub provider: PaymentProvider,
    pub gateway_url: Option<String>,
    #[serde(skip_serializing)]
    pub gateway_api_key: Option<String>,
    /// Amounts (in cents) the mock processor declines
    pub mock_decline_cents: Vec<i64>,
    pub mock_latency_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: DEFAULT_RATE_LIMIT_REQUESTS_PER_MINUTE,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let provider = match std::env::var("PAYMENT_PROVIDER") {
            Ok(raw) => raw.parse()?,
            Err(_) => PaymentProvider::default(),
        };

        let config = Config {
            server: ServerConfig {
                host: std::env::var("VENUE_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: env_or("VENUE_PORT", DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_or(
                    "VENUE_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                ),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: env_or(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                ),
                min_connections: env_or(
                    "DATABASE_MIN_CONNECTIONS",
                    DEFAULT_DATABASE_MIN_CONNECTIONS,
                ),
                connect_timeout_secs: env_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
                idle_timeout_secs: env_or(
                    "DATABASE_IDLE_TIMEOUT",
                    DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
                ),
            },
            cors: CorsConfig {
                allowed_origins: env_list("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|| vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()]),
                allow_credentials: env_or("CORS_ALLOW_CREDENTIALS", true),
            },
            booking: BookingConfig {
                min_duration_minutes: env_or(
                    "BOOKING_MIN_DURATION_MINUTES",
                    DEFAULT_MIN_DURATION_MINUTES,
                ),
                max_duration_minutes: env_or(
                    "BOOKING_MAX_DURATION_MINUTES",
                    DEFAULT_MAX_DURATION_MINUTES,
                ),
                hold_timeout_secs: env_or("BOOKING_HOLD_TIMEOUT_SECS", DEFAULT_HOLD_TIMEOUT_SECS),
                pending_blocks: env_or("BOOKING_PENDING_BLOCKS", true),
                cancellation_notice_hours: env_or(
                    "BOOKING_CANCELLATION_NOTICE_HOURS",
                    DEFAULT_CANCELLATION_NOTICE_HOURS,
                ),
                payment_timeout_secs: env_or(
                    "BOOKING_PAYMENT_TIMEOUT_SECS",
                    DEFAULT_PAYMENT_TIMEOUT_SECS,
                ),
                sweep_interval_secs: env_or(
                    "BOOKING_SWEEP_INTERVAL_SECS",
                    DEFAULT_SWEEP_INTERVAL_SECS,
                ),
                sweep_batch_size: env_or("BOOKING_SWEEP_BATCH_SIZE", DEFAULT_SWEEP_BATCH_SIZE),
            },
            payment: PaymentConfig {
                provider,
                gateway_url: std::env::var("PAYMENT_GATEWAY_URL").ok(),
                gateway_api_key: std::env::var("PAYMENT_GATEWAY_API_KEY").ok(),
                mock_decline_cents: env_list("PAYMENT_MOCK_DECLINE_CENTS")
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|s| s.parse().ok())
                    .collect(),
                mock_latency_ms: env_or("PAYMENT_MOCK_LATENCY_MS", 0),
            },
            rate_limit: RateLimitConfig {
                requests_per_minute: env_or(
                    "RATE_LIMIT_REQUESTS_PER_MINUTE",
                    DEFAULT_RATE_LIMIT_REQUESTS_PER_MINUTE,
                ),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        let booking = &self.booking;
        if booking.min_duration_minutes <= 0 {
            anyhow::bail!("Minimum booking duration must be positive");
        }
        if booking.max_duration_minutes < booking.min_duration_minutes {
            anyhow::bail!(
                "Maximum booking duration ({} min) is below the minimum ({} min)",
                booking.max_duration_minutes,
                booking.min_duration_minutes
            );
        }
        if booking.hold_timeout_secs <= 0 {
            anyhow::bail!("Hold timeout must be positive");
        }
        if booking.cancellation_notice_hours < 0 {
            anyhow::bail!("Cancellation notice cannot be negative");
        }
        if booking.payment_timeout_secs == 0 || booking.sweep_interval_secs == 0 {
            anyhow::bail!("Payment timeout and sweep interval must be greater than 0");
        }
        if booking.sweep_batch_size <= 0 {
            anyhow::bail!("Sweep batch size must be positive");
        }

        if self.payment.provider == PaymentProvider::Http && self.payment.gateway_url.is_none() {
            anyhow::bail!("PAYMENT_GATEWAY_URL is required when PAYMENT_PROVIDER=http");
        }

        if self.rate_limit.requests_per_minute == 0 {
            anyhow::bail!("Rate limit must allow at least one request per minute");
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
            booking: BookingConfig::default(),
            payment: PaymentConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}
