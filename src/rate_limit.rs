/// Rate limiting for unauthenticated traffic
///
/// Enrollment is the one endpoint anyone can hit without a key, so it gets
/// its own limiter; everything else is either cheap or gated by a resolved
/// sender.
use crate::{
    config::RateLimitConfig,
    context::AppContext,
    error::{KeyringError, KeyringResult},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc};

const DEFAULT_ENROLL_RPS: NonZeroU32 = match NonZeroU32::new(50) {
    Some(n) => n,
    None => unreachable!(),
};

const DEFAULT_ENROLL_BURST: NonZeroU32 = match NonZeroU32::new(100) {
    Some(n) => n,
    None => unreachable!(),
};

/// Rate limiter manager
#[derive(Clone)]
pub struct RateLimiter {
    enroll: Option<Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            return Self { enroll: None };
        }

        let quota = Quota::per_second(
            NonZeroU32::new(config.enroll_requests_per_second).unwrap_or(DEFAULT_ENROLL_RPS),
        )
        .allow_burst(NonZeroU32::new(config.enroll_burst).unwrap_or(DEFAULT_ENROLL_BURST));

        Self {
            enroll: Some(Arc::new(GovernorLimiter::direct(quota))),
        }
    }

    /// Check rate limit for an enrollment request
    pub fn check_enroll(&self) -> KeyringResult<()> {
        let Some(limiter) = &self.enroll else {
            return Ok(());
        };

        limiter
            .check()
            .map_err(|not_until| KeyringError::RateLimitExceeded {
                retry_after: not_until.wait_time_from(DefaultClock::default().now()),
            })
    }
}

/// Rate limiting middleware for enrollment routes
pub async fn enroll_rate_limit(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, KeyringError> {
    ctx.rate_limiter.check_enroll()?;
    Ok(next.run(request).await)
}
