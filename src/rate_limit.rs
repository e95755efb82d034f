/// Rate limiting for the credential surface
///
/// Damps brute-force attempts against sign-in/sign-up. The credential
/// endpoints are the only unauthenticated write surface this service
/// exposes, so a single direct limiter is enough.
use crate::{
    config::RateLimitConfig,
    context::AppContext,
    error::{GateError, GateResult},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc};

/// Rate limiter over credential attempts
#[derive(Clone)]
pub struct RateLimiter {
    credentials: Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let quota = Quota::per_minute(
            NonZeroU32::new(config.credential_attempts_per_minute)
                .unwrap_or(NonZeroU32::new(10).unwrap()),
        )
        .allow_burst(NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::new(5).unwrap()));

        Self {
            credentials: Arc::new(GovernorLimiter::direct(quota)),
        }
    }

    /// Check the limit for one credential attempt
    pub fn check_credential_attempt(&self) -> GateResult<()> {
        match self.credentials.check() {
            Ok(_) => Ok(()),
            Err(_) => Err(GateError::RateLimitExceeded {
                retry_after: std::time::Duration::from_secs(60),
            }),
        }
    }
}

/// Middleware applying the credential limiter to sign-in/sign-up
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    req: Request,
    next: Next,
) -> Result<Response, GateError> {
    if !ctx.config.rate_limit.enabled {
        return Ok(next.run(req).await);
    }

    let path = req.uri().path();
    if path == "/v1/auth/sign-in" || path == "/v1/auth/sign-up" {
        ctx.rate_limiter.check_credential_attempt()?;
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_is_allowed_then_limited() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            enabled: true,
            credential_attempts_per_minute: 1,
            burst_size: 3,
        });

        for _ in 0..3 {
            limiter.check_credential_attempt().unwrap();
        }

        let err = limiter.check_credential_attempt().unwrap_err();
        assert!(matches!(err, GateError::RateLimitExceeded { .. }));
    }
}
