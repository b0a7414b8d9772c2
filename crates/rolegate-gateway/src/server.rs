//! Gateway server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::GatewayError;
use crate::auth::{AuthError, AuthState, Authenticated, Claims, Credentials, require_permission};
use crate::middleware::{GatewayRateLimiter, PRUNE_INTERVAL, login_rate_limit};

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Port to listen on.
    pub port: u16,
    /// Bind address.
    pub bind_address: String,
    /// Enable CORS.
    pub cors: bool,
    /// Browser origins allowed by CORS.
    pub cors_origins: Vec<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Login attempts allowed per client per minute.
    pub login_attempts_per_minute: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 4000,
            bind_address: "127.0.0.1".to_string(),
            cors: true,
            cors_origins: vec!["http://localhost:5173".to_string()],
            timeout: Duration::from_secs(30),
            login_attempts_per_minute: 30,
        }
    }
}

impl GatewayConfig {
    /// Build from the gateway section of the loaded configuration.
    #[must_use]
    pub fn from_core(config: &rolegate_core::GatewayConfig) -> Self {
        Self {
            port: config.port,
            bind_address: config.bind_address(),
            cors: config.cors,
            cors_origins: config.cors_origins.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            login_attempts_per_minute: config.login_attempts_per_minute,
        }
    }
}

/// Gateway server state shared across handlers.
#[derive(Debug, Clone)]
pub struct GatewayState {
    /// Authentication state.
    pub auth: Arc<AuthState>,
    /// Login rate limiter.
    pub limiter: Arc<GatewayRateLimiter>,
}

/// Gateway server.
#[derive(Debug)]
pub struct Gateway {
    config: GatewayConfig,
    state: GatewayState,
}

impl Gateway {
    /// Create a gateway serving `auth`.
    #[must_use]
    pub fn new(config: GatewayConfig, auth: Arc<AuthState>) -> Self {
        let limiter = Arc::new(GatewayRateLimiter::new(config.login_attempts_per_minute));
        Self {
            config,
            state: GatewayState { auth, limiter },
        }
    }

    /// Build the HTTP router.
    ///
    /// # Errors
    ///
    /// Returns error if a configured CORS origin is not a valid header value.
    pub fn router(&self) -> Result<Router, GatewayError> {
        let api = Router::new()
            .route("/api/{operation}", get(operation_handler))
            .route_layer(middleware::from_fn_with_state(
                self.state.auth.clone(),
                require_permission,
            ));

        let login = Router::new()
            .route("/login", post(login_handler))
            .route_layer(middleware::from_fn_with_state(
                self.state.limiter.clone(),
                login_rate_limit,
            ));

        let mut app = Router::new()
            .route("/health", get(health_handler))
            .merge(api)
            .merge(login)
            .with_state(self.state.clone())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                self.config.timeout,
            ))
            .layer(TraceLayer::new_for_http());

        if self.config.cors {
            app = app.layer(cors_layer(&self.config.cors_origins)?);
        }

        Ok(app)
    }

    /// Run the gateway server until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns error if the address is invalid or the listener fails.
    pub async fn run(&self) -> Result<(), GatewayError> {
        let app = self.router()?;

        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| GatewayError::Config(format!("Invalid address: {e}")))?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Gateway listening on http://{}", addr);

        let pruner = self.state.limiter.spawn_pruner(PRUNE_INTERVAL);

        let served = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        pruner.abort();
        served.map_err(|e| GatewayError::Server(e.to_string()))?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer, GatewayError> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|e| GatewayError::Config(format!("Invalid CORS origin '{origin}': {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Successful login response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    message: &'static str,
    token: String,
    expires_at: DateTime<Utc>,
}

async fn login_handler(
    State(state): State<GatewayState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<LoginResponse>, AuthError> {
    let Json(credentials) = body.map_err(|rejection| {
        tracing::debug!(status = %rejection.status(), "Login body rejected");
        AuthError::MalformedInput(rejection.status().to_string())
    })?;

    let grant = state.auth.login(credentials).await?;

    Ok(Json(LoginResponse {
        message: "Login successful!",
        token: grant.token,
        expires_at: grant.expires_at,
    }))
}

/// Response for a permitted operation.
#[derive(Debug, Serialize)]
struct OperationResponse {
    message: String,
    user: Claims,
}

/// Greeting returned for a permitted operation.
fn welcome_message(operation: &str) -> String {
    match operation {
        "profile" => "Welcome to your User Profile!".to_string(),
        "moderator" => "Welcome to the Moderator Panel!".to_string(),
        "admin" => "Welcome to the Admin Dashboard!".to_string(),
        other => format!("Access granted: {other}"),
    }
}

async fn operation_handler(Authenticated(context): Authenticated) -> impl IntoResponse {
    Json(OperationResponse {
        message: welcome_message(&context.operation),
        user: context.claims,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthConfig, PasswordHasher};
    use axum::body::Body;
    use axum::http::Request;
    use rolegate_core::{IdentityRecord, Role, SigningSecret};
    use tower::ServiceExt;

    fn gateway() -> Gateway {
        let hasher = PasswordHasher::new(1024, 1, 1).unwrap();
        let config = AuthConfig::builder(
            SigningSecret::new("test-signing-secret-with-32-plus-bytes".to_string()).unwrap(),
        )
        .identity(IdentityRecord {
            id: 1,
            username: "admin".to_string(),
            password_hash: hasher.hash("admin123").unwrap(),
            role: Role::Admin,
        })
        .hasher(hasher)
        .build();

        Gateway::new(
            GatewayConfig::default(),
            Arc::new(AuthState::initialize(config).unwrap()),
        )
    }

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.port, 4000);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.cors_origins, vec!["http://localhost:5173"]);
    }

    #[test]
    fn test_from_core() {
        let core = rolegate_core::GatewayConfig {
            port: 8080,
            mode: rolegate_core::BindMode::Public,
            ..Default::default()
        };
        let config = GatewayConfig::from_core(&core);
        assert_eq!(config.port, 8080);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_welcome_messages() {
        assert_eq!(welcome_message("profile"), "Welcome to your User Profile!");
        assert_eq!(welcome_message("moderator"), "Welcome to the Moderator Panel!");
        assert_eq!(welcome_message("admin"), "Welcome to the Admin Dashboard!");
        assert_eq!(welcome_message("reports"), "Access granted: reports");
    }

    #[test]
    fn test_invalid_cors_origin() {
        let mut gateway = gateway();
        gateway.config.cors_origins = vec!["bad\norigin".to_string()];
        assert!(matches!(gateway.router(), Err(GatewayError::Config(_))));
    }

    #[tokio::test]
    async fn test_health() {
        let app = gateway().router().unwrap();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let app = gateway().router().unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/login")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "http://localhost:5173"
        );
    }
}
