/// MFA gateway
///
/// Sequences TOTP enrollment, challenge issuance and verification against
/// the auth provider, and keeps enrollment hygiene: abandoned (unverified)
/// factors are discarded before a new enrollment starts.
use crate::{
    error::GateResult,
    metrics,
    provider::{AuthProvider, FactorStatus, TotpFactor},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Challenge lifetime surfaced to clients as a countdown
pub const CHALLENGE_WINDOW_SECS: u64 = 30;

/// Provisioning payload returned when enrollment starts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentStart {
    pub factor_id: String,
    /// Rendered as a QR code for authenticator apps
    pub qr_payload: String,
    /// Raw secret for manual entry
    pub shared_secret: String,
}

/// Verified factors for the current user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorList {
    pub factors: Vec<TotpFactor>,
    pub has_enabled_mfa: bool,
}

/// Wraps the provider's TOTP primitives with enrollment hygiene
#[derive(Clone)]
pub struct MfaGateway {
    provider: Arc<dyn AuthProvider>,
}

impl MfaGateway {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self { provider }
    }

    /// Start TOTP enrollment.
    ///
    /// Any unverified factor left behind by an abandoned attempt is deleted
    /// first, so enrollment can be retried any number of times without
    /// accumulating orphans.
    pub async fn begin_enrollment(&self, access_token: &str) -> GateResult<EnrollmentStart> {
        let existing = self.provider.list_factors(access_token).await?;
        for factor in existing
            .iter()
            .filter(|f| f.status == FactorStatus::Unverified)
        {
            tracing::debug!(factor_id = %factor.id, "Discarding abandoned unverified factor");
            self.provider
                .unenroll_factor(access_token, &factor.id)
                .await?;
        }

        let friendly_name = format!("Authenticator ({})", Utc::now().format("%Y-%m-%d %H:%M"));
        let enrollment = self
            .provider
            .enroll_totp(access_token, &friendly_name)
            .await?;

        Ok(EnrollmentStart {
            factor_id: enrollment.factor_id,
            qr_payload: enrollment.qr_payload,
            shared_secret: enrollment.shared_secret,
        })
    }

    /// Verify the first code from the authenticator app; only success
    /// promotes the factor to verified.
    pub async fn confirm_enrollment(
        &self,
        access_token: &str,
        factor_id: &str,
        code: &str,
    ) -> GateResult<()> {
        self.challenge_and_verify(access_token, factor_id, code).await
    }

    /// Check a code during login or before disabling MFA.
    ///
    /// Every invocation issues a fresh challenge; codes are never reusable
    /// across calls.
    pub async fn verify_challenge(
        &self,
        access_token: &str,
        factor_id: &str,
        code: &str,
    ) -> GateResult<()> {
        self.challenge_and_verify(access_token, factor_id, code).await
    }

    /// Remove a factor. Callers must have re-confirmed identity with
    /// `verify_challenge` in the same flow.
    pub async fn unenroll(&self, access_token: &str, factor_id: &str) -> GateResult<()> {
        self.provider.unenroll_factor(access_token, factor_id).await
    }

    /// Usable (verified) factors; `has_enabled_mfa` is true iff at least
    /// one exists.
    pub async fn list_factors(&self, access_token: &str) -> GateResult<FactorList> {
        let factors: Vec<TotpFactor> = self
            .provider
            .list_factors(access_token)
            .await?
            .into_iter()
            .filter(|f| f.status == FactorStatus::Verified)
            .collect();

        let has_enabled_mfa = !factors.is_empty();
        Ok(FactorList {
            factors,
            has_enabled_mfa,
        })
    }

    async fn challenge_and_verify(
        &self,
        access_token: &str,
        factor_id: &str,
        code: &str,
    ) -> GateResult<()> {
        let challenge = self.provider.create_challenge(access_token, factor_id).await?;

        match self
            .provider
            .verify_challenge(access_token, factor_id, &challenge.id, code)
            .await
        {
            Ok(()) => {
                metrics::MFA_VERIFICATIONS_TOTAL
                    .with_label_values(&["accepted"])
                    .inc();
                Ok(())
            }
            Err(err) => {
                metrics::MFA_VERIFICATIONS_TOTAL
                    .with_label_values(&["rejected"])
                    .inc();
                Err(err)
            }
        }
    }
}
