/// Rate limiting for anonymous form posts
///
/// Login and password-reset forms are the only endpoints reachable without a
/// session, so they get a per-client quota.
use crate::{
    config::RateLimitConfig,
    context::AppContext,
    error::{AppError, AppResult},
};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter as GovernorLimiter,
};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

/// Paths throttled by [`rate_limit_middleware`]
const ANONYMOUS_FORMS: [&str; 3] = ["/login", "/forgot_password", "/reset_password"];

/// Rate limiter manager
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    anonymous: Arc<DefaultKeyedRateLimiter<IpAddr>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let per_minute = NonZeroU32::new(config.anonymous_posts_per_minute).unwrap_or(NonZeroU32::MIN);

        Self {
            enabled: config.enabled,
            anonymous: Arc::new(GovernorLimiter::keyed(Quota::per_minute(per_minute))),
        }
    }

    /// Check the anonymous-post quota for a client
    pub fn check_anonymous(&self, client: IpAddr) -> AppResult<()> {
        if !self.enabled {
            return Ok(());
        }

        match self.anonymous.check_key(&client) {
            Ok(_) => Ok(()),
            Err(not_until) => {
                let wait = not_until.wait_time_from(DefaultClock::default().now());
                Err(AppError::RateLimitExceeded {
                    retry_after: wait.max(Duration::from_secs(1)),
                })
            }
        }
    }

    /// Forget clients whose quota has fully replenished
    pub fn retain_recent(&self) {
        self.anonymous.retain_recent();
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Response {
    let throttled = request.method() == Method::POST && ANONYMOUS_FORMS.contains(&request.uri().path());

    if throttled {
        let client = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        if let Err(e) = ctx.rate_limiter.check_anonymous(client) {
            tracing::warn!(%client, path = request.uri().path(), "Rate limit exceeded");
            return e.into_response();
        }
    }

    next.run(request).await
}
