/// Authentication extractors and utilities
use crate::{
    api::middleware::extract_bearer_token,
    context::AppContext,
    error::{GateError, GateResult},
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Authenticated context - extracts and validates the bearer token
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub email: Option<String>,
    /// The provider-issued access token, reused for provider calls made
    /// on the caller's behalf
    pub access_token: String,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = GateError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers).ok_or_else(|| {
            GateError::CredentialRejected("Missing authorization header".to_string())
        })?;

        let token_data = verify_jwt_token(&token, &state.config.provider.jwt_secret)?;
        let claims = &token_data.claims;

        let user_id = claims
            .get("sub")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                GateError::CredentialRejected("Invalid token: missing 'sub' claim".to_string())
            })?
            .to_string();

        let email = claims
            .get("email")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Ok(AuthContext {
            user_id,
            email,
            access_token: token,
        })
    }
}

/// Verify a provider-issued session JWT with full validation
///
/// This performs:
/// 1. HS256 signature verification against the shared provider secret
/// 2. Expiration checking
/// 3. Claims extraction
pub fn verify_jwt_token(
    token: &str,
    jwt_secret: &str,
) -> GateResult<jsonwebtoken::TokenData<serde_json::Value>> {
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    // Allow some clock skew (5 minutes)
    validation.leeway = 300;
    // Provider tokens carry an audience we do not pin
    validation.validate_aud = false;

    decode::<serde_json::Value>(token, &decoding_key, &validation).map_err(|e| {
        tracing::warn!("JWT verification failed: {}", e);
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                GateError::CredentialRejected("Token has expired".to_string())
            }
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                GateError::CredentialRejected("Invalid token signature".to_string())
            }
            _ => GateError::CredentialRejected(format!("Invalid token: {}", e)),
        }
    })
}
