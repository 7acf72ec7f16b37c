// Admin authentication: password hashing, JWT tokens and the admin extractor.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{FromRequestParts, State},
    http::request::Parts,
    response::IntoResponse,
    Json,
};
use axum_extra::{
    extract::WithRejection,
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::{ApiJson, AppState};
use crate::error::RatingError;
use crate::metrics;

pub const ADMIN_ROLE: &str = "admin";

// ── JWT ──────────────────────────────────────────────────────────────

/// JWT secret – in production this should come from an env var.
fn jwt_secret() -> Vec<u8> {
    std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| "chess-club-dev-secret-change-in-production".to_string())
        .into_bytes()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize, // expiry (unix timestamp)
}

pub fn create_token(ttl_hours: i64) -> Result<String, String> {
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::hours(ttl_hours))
        .ok_or_else(|| format!("Token lifetime out of range: {ttl_hours}h"))?
        .timestamp() as usize;

    let claims = Claims {
        sub: ADMIN_ROLE.to_string(),
        role: ADMIN_ROLE.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(&jwt_secret()),
    )
    .map_err(|e| format!("Failed to create token: {e}"))
}

pub fn verify_token(token: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(&jwt_secret()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {e}"))
}

// ── Password hashing ─────────────────────────────────────────────────

pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| format!("Failed to hash password: {e}"))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, String> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| format!("Invalid password hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

// ── Axum extractor: AdminUser ────────────────────────────────────────

/// Rejects the request unless it carries a valid admin bearer token.
/// Usage: `_admin: AdminUser` in handler parameters.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Claims);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = RatingError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| RatingError::Unauthorized("Missing or malformed bearer token".into()))?;

        let claims = verify_token(bearer.token())
            .map_err(|_| RatingError::Unauthorized("Invalid token".into()))?;
        if claims.role != ADMIN_ROLE {
            return Err(RatingError::Unauthorized("Admin access required".into()));
        }
        Ok(AdminUser(claims))
    }
}

// ── Login handler ────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, RatingError> {
    let Some(hash) = state.admin_password_hash.as_deref() else {
        return Err(RatingError::Unauthorized(
            "Admin login is not configured".into(),
        ));
    };

    if !verify_password(&req.password, hash).map_err(RatingError::Internal)? {
        metrics::ADMIN_LOGIN_FAILURES_TOTAL.inc();
        tracing::warn!("Rejected admin login");
        return Err(RatingError::Unauthorized("Invalid password".into()));
    }

    let token = create_token(state.token_ttl_hours).map_err(RatingError::Internal)?;
    tracing::info!("Admin logged in");
    Ok(Json(json!({
        "success": true,
        "token": token,
        "expires_in": state.token_ttl_hours * 3600,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_and_verify() {
        let password = "club-admin-pass";
        let hash = hash_password(password).unwrap();
        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrongpassword", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_rejects_garbage_hash() {
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_jwt_create_and_verify() {
        let token = create_token(1).unwrap();
        let claims = verify_token(&token).unwrap();
        assert_eq!(claims.sub, ADMIN_ROLE);
        assert_eq!(claims.role, ADMIN_ROLE);
    }

    #[test]
    fn test_jwt_invalid_token() {
        assert!(verify_token("invalid.token.here").is_err());
    }

    #[test]
    fn test_jwt_expired_token() {
        // Validation::default() allows 60s of leeway.
        let token = create_token(-1).unwrap();
        assert!(verify_token(&token).is_err());
    }
}
