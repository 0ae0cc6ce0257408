//! Finsight Web Server
//!
//! Axum-based REST API for the Finsight personal finance analyzer.
//!
//! Security features:
//! - Bearer session tokens issued at login (only their hashes are stored)
//! - Operator API keys compared in constant time
//! - Restrictive CORS policy and security headers
//! - Upload size limits
//! - Audit logging for API access
//! - Sanitized error responses

use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, warn};

use finsight_core::db::Database;
use finsight_core::models::User;
use finsight_core::Categorizer;

mod handlers;

/// Maximum file upload size (16 MB)
pub const MAX_UPLOAD_SIZE: usize = finsight_core::ingest::MAX_STATEMENT_SIZE;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Comma-separated operator API keys
pub const API_KEYS_ENV: &str = "FINSIGHT_API_KEYS";

/// Session lifetime in hours
pub const SESSION_HOURS_ENV: &str = "FINSIGHT_SESSION_HOURS";

/// Path of the persisted categorizer model
pub const MODEL_PATH_ENV: &str = "FINSIGHT_MODEL_PATH";

/// Comma-separated CORS origins
pub const ALLOWED_ORIGINS_ENV: &str = "FINSIGHT_ALLOWED_ORIGINS";

pub const DEFAULT_SESSION_HOURS: i64 = 168;
pub const DEFAULT_MODEL_PATH: &str = "finsight-model.json";

/// Authorization header for session tokens and API keys
const AUTHORIZATION_HEADER: &str = "authorization";

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// API keys for operator access
    /// Format: "Bearer <key>" in Authorization header
    pub api_keys: Vec<String>,
    /// How long a login session stays valid
    pub session_hours: i64,
    /// Where the categorizer model is loaded from and saved to
    pub model_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![],
            api_keys: vec![],
            session_hours: DEFAULT_SESSION_HOURS,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
        }
    }
}

impl ServerConfig {
    /// Build configuration from `FINSIGHT_*` environment variables
    pub fn from_env() -> Self {
        let session_hours = match std::env::var(SESSION_HOURS_ENV) {
            Ok(value) => value.trim().parse().unwrap_or_else(|_| {
                warn!(
                    "Ignoring invalid {}={:?}, using {}",
                    SESSION_HOURS_ENV, value, DEFAULT_SESSION_HOURS
                );
                DEFAULT_SESSION_HOURS
            }),
            Err(_) => DEFAULT_SESSION_HOURS,
        };

        Self {
            allowed_origins: parse_list(&std::env::var(ALLOWED_ORIGINS_ENV).unwrap_or_default()),
            api_keys: parse_list(&std::env::var(API_KEYS_ENV).unwrap_or_default()),
            session_hours,
            model_path: std::env::var(MODEL_PATH_ENV)
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
        }
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_hours.max(1))
    }
}

/// Split a comma-separated list, dropping blanks
pub fn parse_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    /// Read for every categorization, written when a model is retrained
    categorizer: RwLock<Categorizer>,
}

impl AppState {
    pub fn new(db: Database, config: ServerConfig) -> Self {
        let categorizer = Categorizer::load(&config.model_path);
        Self::with_categorizer(db, config, categorizer)
    }

    pub fn with_categorizer(db: Database, config: ServerConfig, categorizer: Categorizer) -> Self {
        Self {
            db,
            config,
            categorizer: RwLock::new(categorizer),
        }
    }

    pub fn categorizer(&self) -> Result<RwLockReadGuard<'_, Categorizer>, AppError> {
        self.categorizer
            .read()
            .map_err(|_| AppError::internal("Categorizer lock poisoned"))
    }

    pub fn categorizer_mut(&self) -> Result<RwLockWriteGuard<'_, Categorizer>, AppError> {
        self.categorizer
            .write()
            .map_err(|_| AppError::internal("Categorizer lock poisoned"))
    }
}

/// Who a request is authenticated as
#[derive(Debug, Clone)]
pub enum Principal {
    /// A logged-in user (session token)
    User(User),
    /// Operator access via API key; owns no data
    ApiKey,
}

impl Principal {
    /// Name recorded in the audit log
    pub fn actor(&self) -> String {
        match self {
            Principal::User(user) => user.username.clone(),
            Principal::ApiKey => "api-key".to_string(),
        }
    }

    /// The user behind the request, for routes that read or write user data
    pub fn user(&self) -> Result<&User, AppError> {
        match self {
            Principal::User(user) => Ok(user),
            Principal::ApiKey => Err(AppError::forbidden(
                "This endpoint requires a user session",
            )),
        }
    }
}

/// Extract the bearer token from the Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authentication middleware - validates session tokens or API keys
///
/// On success the resolved [`Principal`] is stored in the request
/// extensions for handlers to pick up.
///
/// **API keys**: Compared using constant-time comparison to prevent timing attacks.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let token = bearer_token(request.headers()).map(str::to_string);

    let principal = match token {
        Some(token) => match state.db.get_user_by_session(&token) {
            Ok(Some(user)) => {
                info!(user = %user.username, path = %path, "Authenticated via session");
                Some(Principal::User(user))
            }
            Ok(None) if validate_api_key(&token, &state.config.api_keys) => {
                info!(user = "api-key", path = %path, "Authenticated via API key");
                Some(Principal::ApiKey)
            }
            Ok(None) => None,
            Err(e) => {
                error!(error = %e, "Session lookup failed");
                return AppError::internal("Session lookup failed").into_response();
            }
        },
        None => None,
    };

    match principal {
        Some(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        None => {
            warn!(path = %path, "Unauthorized request - no valid auth");
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "error": "Authentication required"
                })),
            )
                .into_response()
        }
    }
}

/// Validate API key using constant-time comparison
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided = provided.as_bytes();
    let mut found = false;
    for key in valid_keys {
        let key = key.as_bytes();
        // Length is not secret; ct_eq requires equal lengths
        if key.len() == provided.len() && bool::from(key.ct_eq(provided)) {
            found = true;
        }
    }
    found
}

/// Simple success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// GET /health - liveness probe
async fn health() -> &'static str {
    "ok"
}

/// Create the application router
pub fn create_router(db: Database, static_dir: Option<&str>, config: ServerConfig) -> Router {
    let state = Arc::new(AppState::new(db, config));
    create_router_with_state(state, static_dir)
}

/// Create the router around existing state
pub fn create_router_with_state(state: Arc<AppState>, static_dir: Option<&str>) -> Router {
    let public_routes = Router::new()
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/health", get(health));

    let protected_routes = Router::new()
        // Session
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/me", get(handlers::get_me))
        // Statement import
        .route(
            "/api/upload",
            post(handlers::upload_statement).layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE + 64 * 1024)),
        )
        .route("/api/imports", get(handlers::list_imports))
        // Transactions
        .route("/api/transactions", get(handlers::list_transactions))
        .route("/api/update_category", post(handlers::update_category))
        // Analytics
        .route("/api/stats", get(handlers::get_stats))
        .route("/api/categories", get(handlers::get_categories))
        .route("/api/monthly", get(handlers::get_monthly))
        .route("/api/heatmap", get(handlers::get_heatmap))
        .route("/api/anomalies", get(handlers::get_anomalies))
        .route("/api/projections", get(handlers::get_projections))
        .route("/api/recurring", get(handlers::get_recurring))
        // Category rules
        .route(
            "/api/rules",
            get(handlers::list_rules).post(handlers::create_rule),
        )
        .route("/api/rules/test", post(handlers::test_rule))
        .route("/api/rules/:id", delete(handlers::delete_rule))
        // Categorizer model
        .route("/api/model/train", post(handlers::train_model))
        // Audit log
        .route("/api/audit", get(handlers::list_audit_log))
        // PDF report
        .route("/report", get(handlers::download_report))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Build CORS layer
    let cors = if state.config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    // CSP: same-origin scripts, inline styles for the dashboard, data: images for charts
    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' blob: data:; font-src 'self'; connect-src 'self'; frame-ancestors 'none'"
    );

    let mut app = public_routes
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    // Serve static files if directory provided
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    match db.purge_expired_sessions() {
        Ok(count) if count > 0 => info!("Purged {} expired session(s)", count),
        Ok(_) => {}
        Err(e) => warn!("Failed to purge expired sessions: {}", e),
    }

    if config.api_keys.is_empty() {
        info!("No operator API keys configured ({})", API_KEYS_ENV);
    }

    let app = create_router(db, static_dir, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self::with_status(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn forbidden(msg: &str) -> Self {
        Self::with_status(StatusCode::FORBIDDEN, msg)
    }

    pub fn internal(msg: &str) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    fn with_status(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        use finsight_core::Error as CoreError;

        let err = err.into();

        // Client mistakes surface their message; everything else is hidden
        let client_status = match err.downcast_ref::<CoreError>() {
            Some(
                CoreError::Import(_)
                | CoreError::UnsupportedBank(_)
                | CoreError::UnsupportedFormat(_)
                | CoreError::InvalidData(_)
                | CoreError::Csv(_)
                | CoreError::Pdf(_)
                | CoreError::Regex(_),
            ) => Some(StatusCode::BAD_REQUEST),
            Some(CoreError::NotFound(_)) => Some(StatusCode::NOT_FOUND),
            Some(CoreError::Conflict(_)) => Some(StatusCode::CONFLICT),
            Some(CoreError::Auth(_)) => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        };

        match client_status {
            Some(status) => Self {
                status,
                message: err.to_string(),
                internal: None,
            },
            None => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                // Return generic message to client
                message: "An internal error occurred".to_string(),
                // Keep full error for logging
                internal: Some(err),
            },
        }
    }
}
