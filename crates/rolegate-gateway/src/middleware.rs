//! Gateway middleware.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::auth::AuthError;

/// Key used when the peer address is unknown.
const UNKNOWN_CLIENT: &str = "local";

/// How often idle clients are dropped from the login limiter.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Per-client rate limiter for login attempts.
pub struct GatewayRateLimiter {
    client_limiter: RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>,
}

impl GatewayRateLimiter {
    /// Create a limiter allowing `requests_per_minute` per client.
    #[must_use]
    pub fn new(requests_per_minute: u32) -> Self {
        Self::with_quota(Quota::per_minute(
            NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN),
        ))
    }

    fn with_quota(quota: Quota) -> Self {
        Self {
            client_limiter: RateLimiter::keyed(quota),
        }
    }

    /// Check if a request is allowed.
    #[must_use]
    pub fn check(&self, client_id: &str) -> bool {
        self.client_limiter
            .check_key(&client_id.to_string())
            .is_ok()
    }

    /// Drop clients whose budget has fully replenished.
    ///
    /// A pruned client starts again with a full budget, exactly as if it had
    /// been kept.
    pub fn prune(&self) {
        self.client_limiter.retain_recent();
        self.client_limiter.shrink_to_fit();
    }

    /// Number of clients currently tracked.
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.client_limiter.len()
    }

    /// Prune the limiter every `period` until the returned task is aborted.
    pub fn spawn_pruner(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                limiter.prune();
                tracing::debug!(
                    clients = limiter.tracked_clients(),
                    "Pruned login rate limiter"
                );
            }
        })
    }
}

impl Default for GatewayRateLimiter {
    fn default() -> Self {
        Self::new(30)
    }
}

impl std::fmt::Debug for GatewayRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayRateLimiter").finish_non_exhaustive()
    }
}

/// Client key for rate limiting: the peer IP when known.
fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| UNKNOWN_CLIENT.to_string(), |ConnectInfo(addr)| addr.ip().to_string())
}

/// Middleware limiting login attempts per client.
pub async fn login_rate_limit(
    State(limiter): State<Arc<GatewayRateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);

    if !limiter.check(&client) {
        tracing::warn!(%client, "Login rate limit exceeded");
        return AuthError::RateLimited.into_response();
    }

    next.run(request).await
}
