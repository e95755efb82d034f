/// HTTP client for a GoTrue-style auth provider REST surface
use crate::{
    config::ProviderConfig,
    error::{GateError, GateResult},
    provider::{
        AuthProvider, FactorStatus, ProviderSession, TotpChallenge, TotpEnrollment, TotpFactor,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;

/// Auth provider client speaking the provider's REST API
#[derive(Clone)]
pub struct HttpAuthProvider {
    base_url: String,
    anon_key: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
    user: ProviderUser,
}

#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    factors: Vec<RawFactor>,
}

#[derive(Debug, Deserialize)]
struct RawFactor {
    id: String,
    #[serde(default)]
    friendly_name: Option<String>,
    #[serde(default)]
    factor_type: Option<String>,
    status: String,
}

#[derive(Debug, Deserialize)]
struct EnrollResponse {
    id: String,
    totp: EnrollTotp,
}

#[derive(Debug, Deserialize)]
struct EnrollTotp {
    qr_code: String,
    secret: String,
}

#[derive(Debug, Deserialize)]
struct ChallengeResponse {
    id: String,
    #[serde(default)]
    expires_at: Option<i64>,
}

impl HttpAuthProvider {
    pub fn new(config: &ProviderConfig) -> GateResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("Subguard/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GateError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            http_client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Pull a human-readable message out of a provider error body.
    /// Anything unrecognized is coerced to a generic message rather than
    /// passed upward in its provider-specific shape.
    fn error_message(body: &str) -> String {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
            for key in ["error_description", "msg", "message", "error"] {
                if let Some(message) = value.get(key).and_then(|v| v.as_str()) {
                    if !message.is_empty() {
                        return message.to_string();
                    }
                }
            }
        }
        "Unknown error".to_string()
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> GateResult<(reqwest::StatusCode, String)> {
        let response = request
            .header("apikey", &self.anon_key)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Auth provider request failed: {}", e);
                GateError::Provider("Unknown error".to_string())
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Ok((status, body))
    }

    fn expires_at_from_epoch(epoch: Option<i64>) -> Option<DateTime<Utc>> {
        epoch.and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> GateResult<ProviderSession> {
        let request = self
            .http_client
            .post(self.endpoint("/token?grant_type=password"))
            .json(&json!({ "email": email, "password": password }));

        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            // Bad credentials come back as 400/401 from the token grant
            return Err(GateError::CredentialRejected(Self::error_message(&body)));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|_| GateError::Provider("Unknown error".to_string()))?;

        Ok(ProviderSession {
            user_id: token.user.id,
            email: token.user.email.unwrap_or_else(|| email.to_string()),
            access_token: token.access_token,
            expires_at: Self::expires_at_from_epoch(token.expires_at),
        })
    }

    async fn sign_up_with_password(&self, email: &str, password: &str) -> GateResult<()> {
        let request = self
            .http_client
            .post(self.endpoint("/signup"))
            .json(&json!({ "email": email, "password": password }));

        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(GateError::Provider(Self::error_message(&body)));
        }

        Ok(())
    }

    async fn sign_out(&self, access_token: &str) -> GateResult<()> {
        let request = self
            .http_client
            .post(self.endpoint("/logout"))
            .bearer_auth(access_token);

        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(GateError::Provider(Self::error_message(&body)));
        }

        Ok(())
    }

    async fn enroll_totp(
        &self,
        access_token: &str,
        friendly_name: &str,
    ) -> GateResult<TotpEnrollment> {
        let request = self
            .http_client
            .post(self.endpoint("/factors"))
            .bearer_auth(access_token)
            .json(&json!({ "factor_type": "totp", "friendly_name": friendly_name }));

        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(GateError::Provider(Self::error_message(&body)));
        }

        let enrolled: EnrollResponse = serde_json::from_str(&body)
            .map_err(|_| GateError::Provider("Unknown error".to_string()))?;

        Ok(TotpEnrollment {
            factor_id: enrolled.id,
            qr_payload: enrolled.totp.qr_code,
            shared_secret: enrolled.totp.secret,
        })
    }

    async fn create_challenge(
        &self,
        access_token: &str,
        factor_id: &str,
    ) -> GateResult<TotpChallenge> {
        let request = self
            .http_client
            .post(self.endpoint(&format!("/factors/{}/challenge", factor_id)))
            .bearer_auth(access_token);

        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(GateError::Provider(Self::error_message(&body)));
        }

        let challenge: ChallengeResponse = serde_json::from_str(&body)
            .map_err(|_| GateError::Provider("Unknown error".to_string()))?;

        Ok(TotpChallenge {
            id: challenge.id,
            expires_at: Self::expires_at_from_epoch(challenge.expires_at)
                .unwrap_or_else(|| Utc::now() + chrono::Duration::seconds(30)),
        })
    }

    async fn verify_challenge(
        &self,
        access_token: &str,
        factor_id: &str,
        challenge_id: &str,
        code: &str,
    ) -> GateResult<()> {
        let request = self
            .http_client
            .post(self.endpoint(&format!("/factors/{}/verify", factor_id)))
            .bearer_auth(access_token)
            .json(&json!({ "challenge_id": challenge_id, "code": code }));

        let (status, body) = self.send(request).await?;
        if status.is_client_error() {
            return Err(GateError::InvalidMfaCode(Self::error_message(&body)));
        }
        if !status.is_success() {
            return Err(GateError::Provider(Self::error_message(&body)));
        }

        Ok(())
    }

    async fn unenroll_factor(&self, access_token: &str, factor_id: &str) -> GateResult<()> {
        let request = self
            .http_client
            .delete(self.endpoint(&format!("/factors/{}", factor_id)))
            .bearer_auth(access_token);

        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(GateError::Provider(Self::error_message(&body)));
        }

        Ok(())
    }

    async fn list_factors(&self, access_token: &str) -> GateResult<Vec<TotpFactor>> {
        let request = self
            .http_client
            .get(self.endpoint("/user"))
            .bearer_auth(access_token);

        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(GateError::Provider(Self::error_message(&body)));
        }

        let user: ProviderUser = serde_json::from_str(&body)
            .map_err(|_| GateError::Provider("Unknown error".to_string()))?;

        let factors = user
            .factors
            .into_iter()
            .filter(|f| f.factor_type.as_deref().unwrap_or("totp") == "totp")
            .map(|f| TotpFactor {
                status: if f.status == "verified" {
                    FactorStatus::Verified
                } else {
                    FactorStatus::Unverified
                },
                friendly_name: f.friendly_name.unwrap_or_default(),
                id: f.id,
            })
            .collect();

        Ok(factors)
    }
}
