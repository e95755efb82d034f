/// External auth provider client
///
/// Credential verification, session issuance/invalidation and all TOTP
/// cryptography live with the provider; this crate only sequences calls
/// against it. The trait keeps the gate testable against an in-memory fake.
mod http;

pub use http::HttpAuthProvider;

use crate::error::GateResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A session issued by the provider after a successful credential check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSession {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Provisioning material for a freshly registered TOTP factor
#[derive(Debug, Clone)]
pub struct TotpEnrollment {
    pub factor_id: String,
    /// otpauth:// payload rendered as a QR code by the client
    pub qr_payload: String,
    /// Raw shared secret for manual entry
    pub shared_secret: String,
}

/// A challenge issued against a factor; codes are verified against it
#[derive(Debug, Clone)]
pub struct TotpChallenge {
    pub id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorStatus {
    Verified,
    Unverified,
}

/// A TOTP factor as reported by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotpFactor {
    pub id: String,
    pub friendly_name: String,
    pub status: FactorStatus,
}

/// Operations the gate needs from the auth provider.
///
/// User-scoped operations take the caller's access token; the provider
/// resolves the user from it. Failures are normalized into `GateError`
/// variants by each implementation.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Password check; issues a session on success
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> GateResult<ProviderSession>;

    /// Register a new account with the provider
    async fn sign_up_with_password(&self, email: &str, password: &str) -> GateResult<()>;

    /// Invalidate the session bound to this access token
    async fn sign_out(&self, access_token: &str) -> GateResult<()>;

    /// Register a new TOTP factor for the current user
    async fn enroll_totp(
        &self,
        access_token: &str,
        friendly_name: &str,
    ) -> GateResult<TotpEnrollment>;

    /// Issue a fresh challenge against a factor
    async fn create_challenge(
        &self,
        access_token: &str,
        factor_id: &str,
    ) -> GateResult<TotpChallenge>;

    /// Verify a code against a previously issued challenge
    async fn verify_challenge(
        &self,
        access_token: &str,
        factor_id: &str,
        challenge_id: &str,
        code: &str,
    ) -> GateResult<()>;

    /// Remove a factor
    async fn unenroll_factor(&self, access_token: &str, factor_id: &str) -> GateResult<()>;

    /// All TOTP factors registered for the current user, any status
    async fn list_factors(&self, access_token: &str) -> GateResult<Vec<TotpFactor>>;
}
