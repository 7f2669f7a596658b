//! JWT authentication
//!
//! Access and refresh tokens signed with HS256. The token subject is the
//! learner id; the `staff` permission lets a token act for any learner.

use anyhow::{bail, Context, Result};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Permission allowing a token to act for any learner
pub const STAFF_PERMISSION: &str = "staff";

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (learner ID)
    pub sub: String,
    /// Issued at
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
    /// Token type (access or refresh)
    pub token_type: TokenType,
    /// Permissions carried by the token
    pub permissions: Vec<String>,
    /// Token ID for revocation
    pub jti: String,
}

impl Claims {
    pub fn is_staff(&self) -> bool {
        self.permissions.iter().any(|p| p == STAFF_PERMISSION)
    }

    /// Whether this token may read or write data for `learner_id`
    pub fn can_act_for(&self, learner_id: &str) -> bool {
        self.is_staff() || self.sub == learner_id.trim()
    }
}

/// Token type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Token signing settings
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// JWT secret key (should be 256-bit for HS256)
    pub jwt_secret: String,
    /// Access token expiration (minutes)
    pub access_token_expiry_minutes: i64,
    /// Refresh token expiration (days)
    pub refresh_token_expiry_days: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: generate_jwt_secret(),
            access_token_expiry_minutes: 60,
            refresh_token_expiry_days: 7,
        }
    }
}

/// Authentication state
pub struct AuthState {
    settings: AuthSettings,
    /// Revoked token IDs (for logout and refresh rotation)
    revoked_tokens: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl AuthState {
    /// Create new auth state with settings
    pub fn new(settings: AuthSettings) -> Arc<Self> {
        Arc::new(Self {
            settings,
            revoked_tokens: RwLock::new(HashMap::new()),
        })
    }

    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.settings.access_token_expiry_minutes * 60
    }

    /// Generate access token for a learner
    pub fn generate_access_token(&self, learner_id: &str, permissions: &[String]) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: learner_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(self.settings.access_token_expiry_minutes)).timestamp(),
            token_type: TokenType::Access,
            permissions: permissions.to_vec(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.settings.jwt_secret.as_bytes()),
        )
        .context("Failed to encode JWT")
    }

    /// Generate refresh token; it carries the permissions to reissue
    pub fn generate_refresh_token(&self, learner_id: &str, permissions: &[String]) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: learner_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::days(self.settings.refresh_token_expiry_days)).timestamp(),
            token_type: TokenType::Refresh,
            permissions: permissions.to_vec(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.settings.jwt_secret.as_bytes()),
        )
        .context("Failed to encode refresh token")
    }

    /// Validate and decode token
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.settings.jwt_secret.as_bytes()),
            &validation,
        )
        .context("Invalid token")?;

        if self.is_token_revoked(&token_data.claims.jti) {
            bail!("Token has been revoked");
        }

        Ok(token_data.claims)
    }

    /// Revoke a token (logout)
    pub fn revoke_token(&self, jti: &str) {
        self.revoked_write().insert(jti.to_string(), Utc::now());
    }

    /// Mark a refresh token as used. Returns false if it already was, so
    /// only one of several concurrent refreshes wins.
    pub fn consume_refresh(&self, jti: &str) -> bool {
        match self.revoked_write().entry(jti.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                true
            }
        }
    }

    fn is_token_revoked(&self, jti: &str) -> bool {
        self.revoked_read().contains_key(jti)
    }

    /// Drop revocations old enough that the token has expired anyway
    pub fn cleanup(&self) -> usize {
        let horizon = Utc::now() - Duration::days(self.settings.refresh_token_expiry_days);
        let mut revoked = self.revoked_write();
        let before = revoked.len();
        revoked.retain(|_, revoked_at| *revoked_at > horizon);
        before - revoked.len()
    }

    // Entries are independent, so a poisoned lock is recovered
    fn revoked_read(&self) -> RwLockReadGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.revoked_tokens.read().unwrap_or_else(|e| e.into_inner())
    }

    fn revoked_write(&self) -> RwLockWriteGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.revoked_tokens.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Generate a secure JWT secret
pub fn generate_jwt_secret() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes)
}

/// Axum middleware for JWT authentication
pub async fn auth_middleware(
    State(state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
    else {
        return unauthorized("Missing bearer token");
    };

    let claims = match state.validate_token(token) {
        Ok(claims) => claims,
        Err(e) => {
            debug!("Rejected token: {:#}", e);
            return unauthorized("Invalid token");
        }
    };

    if claims.token_type != TokenType::Access {
        return unauthorized("Invalid token type");
    }

    request.extensions_mut().insert(claims);
    next.run(request).await
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}

/// Access/refresh token pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Refresh token request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Logout request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutRequest {
    pub token: String,
}

/// Issue an access/refresh pair for a learner
pub fn issue_token_pair(state: &AuthState, learner_id: &str, permissions: &[String]) -> Result<TokenPair> {
    Ok(TokenPair {
        access_token: state.generate_access_token(learner_id, permissions)?,
        refresh_token: state.generate_refresh_token(learner_id, permissions)?,
        token_type: "Bearer".to_string(),
        expires_in: state.access_token_expiry_seconds(),
    })
}
