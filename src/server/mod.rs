//! Web server module with JWT authentication

pub mod auth;
pub mod http;

use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::generation::LlmClient;
use crate::quiz::QuizService;
use crate::server::auth::{AuthSettings, AuthState};
use crate::store::SqliteStore;

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    pub quiz: QuizService,
    pub auth_state: Arc<AuthState>,
}

/// TLS certificate and key paths
#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert: String,
    pub key: String,
}

/// Build the application router
pub fn router(state: ServerState, body_limit: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Protected routes (require JWT auth)
    let protected = Router::new()
        .route("/api/quiz/generate", post(http::generate_question_handler))
        .route("/api/generate-quiz", post(http::generate_quiz_handler))
        .route("/api/check-answer", post(http::check_answer_handler))
        .route("/api/learning-path/{learner_id}", get(http::learning_path_handler))
        .route("/api/performance/attempts", post(http::record_attempt_handler))
        .route("/api/performance/scores", post(http::record_score_handler))
        .layer(middleware::from_fn_with_state(
            state.auth_state.clone(),
            auth::auth_middleware,
        ));

    // Public routes (no auth required)
    let public = Router::new()
        .route("/api/auth/refresh", post(http::refresh_handler))
        .route("/api/auth/logout", post(http::logout_handler))
        .route("/api/status", get(http::status_handler));

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Auth state from the config, generating a throwaway secret if none is set
pub fn auth_state_from(config: &mut Config) -> Arc<AuthState> {
    if config.auth.jwt_secret.is_none() {
        tracing::warn!("No auth.jwt_secret configured; tokens will not survive a restart");
    }
    AuthState::new(AuthSettings {
        jwt_secret: config.ensure_jwt_secret(),
        access_token_expiry_minutes: config.auth.access_token_expiry_minutes,
        refresh_token_expiry_days: config.auth.refresh_token_expiry_days,
    })
}

/// Start the web server
pub async fn start(mut config: Config, tls: Option<TlsPaths>) -> Result<()> {
    let db_path = config.database_path()?;
    let store = SqliteStore::open(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let provider = LlmClient::new(config.provider_config()?)?;
    let quiz = QuizService::new(Arc::new(store), Arc::new(provider), config.quiz_settings());

    let state = ServerState {
        quiz,
        auth_state: auth_state_from(&mut config),
    };

    // Periodically forget revocations of tokens that have expired anyway
    let auth_state = state.auth_state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            interval.tick().await;
            let removed = auth_state.cleanup();
            if removed > 0 {
                info!("Dropped {} expired token revocations", removed);
            }
        }
    });

    let app = router(state, config.server.body_limit);
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server host/port")?;

    info!(
        %addr,
        database = %db_path.display(),
        model = %config.provider.model,
        https = tls.is_some(),
        "Smart quiz server starting"
    );

    if let Some(tls) = tls {
        let cert_data = tokio::fs::read(&tls.cert)
            .await
            .context("Failed to read certificate file")?;
        let key_data = tokio::fs::read(&tls.key)
            .await
            .context("Failed to read key file")?;

        let rustls_config = axum_server::tls_rustls::RustlsConfig::from_pem(cert_data, key_data).await?;
        axum_server::bind_rustls(addr, rustls_config)
            .serve(app.into_make_service())
            .await?;
        return Ok(());
    }

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
