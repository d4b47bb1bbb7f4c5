//! Per-client-IP rate limiting using tower-governor

use std::sync::Arc;

use axum::Router;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::config::RateLimitConfig;

/// Token-bucket parameters derived from a requests-per-minute budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    /// Milliseconds to replenish one request
    pub replenish_ms: u64,
    pub burst_size: u32,
}

impl Quota {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        let per_minute = config.requests_per_minute.max(1);
        Self {
            replenish_ms: (60_000 / per_minute).max(1),
            burst_size: u32::try_from(per_minute).unwrap_or(u32::MAX),
        }
    }
}

/// Wrap `router` in a governor layer keyed by peer IP.
///
/// The peer address comes from `ConnectInfo`, so the router must be served
/// with `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn apply_rate_limit(router: Router, config: &RateLimitConfig) -> anyhow::Result<Router> {
    let quota = Quota::from_config(config);

    let governor_conf = GovernorConfigBuilder::default()
        .per_millisecond(quota.replenish_ms)
        .burst_size(quota.burst_size)
        .finish()
        .ok_or_else(|| anyhow::anyhow!("Invalid rate limit quota: {:?}", quota))?;

    tracing::info!(
        requests_per_minute = config.requests_per_minute,
        burst_size = quota.burst_size,
        "Rate limiting enabled"
    );

    Ok(router.layer(GovernorLayer {
        config: Arc::new(governor_conf),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_for_default_budget() {
        let quota = Quota::from_config(&RateLimitConfig::default());
        assert_eq!(quota.replenish_ms, 600);
        assert_eq!(quota.burst_size, 100);
    }

    #[test]
    fn test_quota_never_replenishes_in_zero_ms() {
        let quota = Quota::from_config(&RateLimitConfig {
            requests_per_minute: 120_000,
        });
        assert_eq!(quota.replenish_ms, 1);
    }

    #[test]
    fn test_apply_rate_limit_builds() {
        let router = apply_rate_limit(Router::new(), &RateLimitConfig::default());
        assert!(router.is_ok());
    }
}
