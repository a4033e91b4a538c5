use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use rideshare_core::identity::Caller;

use crate::error::AppError;
use crate::state::AppState;

/// Identity is issued elsewhere; this service only checks the signature and reads the subject.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RiderClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize,
}

impl From<RiderClaims> for Caller {
    fn from(claims: RiderClaims) -> Self {
        Caller {
            user_id: claims.sub,
            email: claims.email.filter(|e| !e.is_empty()),
        }
    }
}

pub async fn rider_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::AuthenticationError("Missing bearer token".to_string()))?;

    let token_data = decode::<RiderClaims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::AuthenticationError(format!("Invalid token: {}", e)))?;

    if token_data.claims.sub.trim().is_empty() {
        return Err(AppError::AuthenticationError("Token has no subject".to_string()));
    }

    req.extensions_mut().insert(Caller::from(token_data.claims));
    Ok(next.run(req).await)
}

/// Mints a token the middleware accepts. Used by local tooling and tests.
pub fn issue_token(
    secret: &str,
    user_id: &str,
    email: Option<&str>,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = RiderClaims {
        sub: user_id.to_string(),
        email: email.map(String::from),
        exp: (Utc::now() + ttl).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}
