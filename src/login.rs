/// Login orchestration
///
/// Sequences a login attempt: allow-list check, credential verification,
/// device fingerprinting, session-limit evaluation, device authorization
/// and the MFA gate. Every failure past the credential check compensates
/// by signing the freshly created provider session back out, so a denied
/// login never leaves an authenticated-but-ungoverned session alive.
use crate::{
    config::AccessPolicy,
    device::{DeviceRepository, NewDevice, SessionLimitPolicy},
    error::{GateError, GateResult},
    fingerprint::{self, DeviceAttributes},
    metrics,
    mfa::MfaGateway,
    provider::{AuthProvider, ProviderSession},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// A login attempt from the dashboard client
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
    /// Browser/system attributes the fingerprint is derived from
    #[serde(default)]
    pub device: DeviceAttributes,
    /// Client-persisted installation id; minted server-side when absent
    #[serde(default)]
    pub device_id: Option<String>,
}

/// Account registration request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

/// Outcome of a login attempt that was not denied
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// Fully authenticated; the session is usable immediately
    Success(ProviderSession),
    /// Credentials and device both accepted, but a second factor is
    /// required before the login counts as complete
    MfaRequired {
        factor_id: String,
        session: ProviderSession,
    },
}

/// Drives the login and sign-out flows
#[derive(Clone)]
pub struct LoginOrchestrator {
    access: AccessPolicy,
    provider: Arc<dyn AuthProvider>,
    devices: Arc<dyn DeviceRepository>,
    policy: SessionLimitPolicy,
    mfa: MfaGateway,
}

impl LoginOrchestrator {
    pub fn new(
        access: AccessPolicy,
        provider: Arc<dyn AuthProvider>,
        devices: Arc<dyn DeviceRepository>,
        mfa: MfaGateway,
    ) -> Self {
        let policy = SessionLimitPolicy::new(Arc::clone(&devices));
        Self {
            access,
            provider,
            devices,
            policy,
            mfa,
        }
    }

    /// Run a login attempt end to end
    pub async fn sign_in(&self, request: SignInRequest) -> GateResult<LoginOutcome> {
        // Allow-list check happens before any provider or store traffic
        if !self.access.permits(&request.email) {
            tracing::warn!(email = %request.email, "Sign-in rejected by allow-list");
            metrics::LOGIN_ATTEMPTS_TOTAL
                .with_label_values(&["denied"])
                .inc();
            return Err(GateError::AccessDenied);
        }

        // Fingerprinting is pure CPU work; start it now so its latency
        // hides behind the credential round-trip.
        let attributes = request.device.clone();
        let fingerprint_task =
            tokio::task::spawn_blocking(move || fingerprint::generate(&attributes));

        let session = match self
            .provider
            .sign_in_with_password(&request.email, &request.password)
            .await
        {
            Ok(session) => session,
            Err(err) => {
                // No provider session exists yet; nothing to compensate
                metrics::LOGIN_ATTEMPTS_TOTAL
                    .with_label_values(&["denied"])
                    .inc();
                return Err(err);
            }
        };

        let device_fingerprint = match fingerprint_task.await {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                // A provider session is already live; sign it back out
                self.compensate(&session).await;
                metrics::LOGIN_ATTEMPTS_TOTAL
                    .with_label_values(&["denied"])
                    .inc();
                return Err(GateError::Internal(format!("Fingerprint task failed: {}", e)));
            }
        };

        // From here on a provider session is live; any failure must sign
        // it back out before surfacing.
        match self
            .authorize_device(&session, &device_fingerprint, &request)
            .await
        {
            Ok(outcome) => {
                let label = match &outcome {
                    LoginOutcome::Success(_) => "success",
                    LoginOutcome::MfaRequired { .. } => "mfa_required",
                };
                metrics::LOGIN_ATTEMPTS_TOTAL.with_label_values(&[label]).inc();
                Ok(outcome)
            }
            Err(err) => {
                self.compensate(&session).await;
                metrics::LOGIN_ATTEMPTS_TOTAL
                    .with_label_values(&["denied"])
                    .inc();
                Err(err)
            }
        }
    }

    /// Register a new account, subject to the same allow-list
    pub async fn sign_up(&self, request: SignUpRequest) -> GateResult<()> {
        if !self.access.permits(&request.email) {
            tracing::warn!(email = %request.email, "Sign-up rejected by allow-list");
            return Err(GateError::AccessDenied);
        }

        self.provider
            .sign_up_with_password(&request.email, &request.password)
            .await
    }

    /// Explicit logout: release the device row, then invalidate the
    /// provider session. Safe to call twice; the second call is a no-op.
    pub async fn sign_out(&self, access_token: &str) -> GateResult<()> {
        self.devices.deactivate_by_session(access_token).await?;

        if let Err(err) = self.provider.sign_out(access_token).await {
            // The provider may already consider the session gone
            tracing::debug!("Provider sign-out returned an error: {}", err);
        }

        Ok(())
    }

    /// Steps 4-6 of the login sequence: session limit, device
    /// authorization, MFA gate.
    async fn authorize_device(
        &self,
        session: &ProviderSession,
        device_fingerprint: &str,
        request: &SignInRequest,
    ) -> GateResult<LoginOutcome> {
        let verdict = self
            .policy
            .evaluate(&session.user_id, device_fingerprint)
            .await?;

        if verdict.limit_reached {
            let device_names = verdict
                .active_sessions
                .iter()
                .map(|d| d.device_name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::info!(
                user_id = %session.user_id,
                "Sign-in blocked: concurrent-session ceiling reached"
            );
            return Err(GateError::SessionLimitReached { device_names });
        }

        match self
            .devices
            .find_by_fingerprint(&session.user_id, device_fingerprint)
            .await?
        {
            Some(device) => {
                // Known device: refresh activity and rebind the session
                self.devices
                    .activate(&device.id, &session.access_token)
                    .await?;
            }
            None => {
                let device = NewDevice {
                    user_id: session.user_id.clone(),
                    device_id: request
                        .device_id
                        .clone()
                        .unwrap_or_else(|| Uuid::new_v4().to_string()),
                    device_fingerprint: device_fingerprint.to_string(),
                    device_name: request.device.device_name(),
                    browser: request.device.browser.clone(),
                    os: request.device.os.clone(),
                    platform: request.device.platform.clone(),
                    session_token: session.access_token.clone(),
                };
                self.devices
                    .insert(device)
                    .await
                    .map_err(|err| {
                        tracing::error!("Failed to register device: {}", err);
                        GateError::DeviceRegistrationFailed
                    })?;
            }
        }

        // MFA gate: a listing failure is treated as no MFA so an outage at
        // the provider's factor endpoint cannot lock the operator out.
        let factors = match self.mfa.list_factors(&session.access_token).await {
            Ok(factors) => factors,
            Err(err) => {
                tracing::warn!("Failed to list MFA factors: {}", err);
                return Ok(LoginOutcome::Success(session.clone()));
            }
        };

        if factors.has_enabled_mfa {
            let factor_id = factors.factors[0].id.clone();
            return Ok(LoginOutcome::MfaRequired {
                factor_id,
                session: session.clone(),
            });
        }

        Ok(LoginOutcome::Success(session.clone()))
    }

    /// Sign the just-created provider session back out after a denied
    /// attempt. Best effort: the residual window where the client goes
    /// away before this runs is a known gap; compensation failures are
    /// logged, not surfaced over the denial itself.
    async fn compensate(&self, session: &ProviderSession) {
        metrics::COMPENSATING_SIGNOUTS_TOTAL.inc();
        if let Err(err) = self.provider.sign_out(&session.access_token).await {
            tracing::error!(
                user_id = %session.user_id,
                "Compensating sign-out failed: {}",
                err
            );
        }
    }
}
