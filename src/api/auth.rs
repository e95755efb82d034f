/// Login gate and settings-surface endpoints
use crate::{
    auth::AuthContext,
    context::AppContext,
    device::ActiveSessionInfo,
    error::{GateError, GateResult},
    fingerprint::{self, DeviceAttributes},
    login::{LoginOutcome, SignInRequest, SignUpRequest},
    mfa::{EnrollmentStart, CHALLENGE_WINDOW_SECS},
    provider::ProviderSession,
};
use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/v1/auth/sign-in", post(sign_in))
        .route("/v1/auth/sign-up", post(sign_up))
        .route("/v1/auth/sign-out", post(sign_out))
        .route("/v1/auth/me", get(me))
        .route("/v1/auth/sessions", get(list_sessions))
        .route("/v1/auth/sessions/heartbeat", post(session_heartbeat))
        .route("/v1/auth/sessions/:id", delete(terminate_session))
        .route("/v1/auth/devices/:id", delete(remove_device))
        .route("/v1/auth/mfa/factors", get(list_factors))
        .route("/v1/auth/mfa/enroll", post(begin_enrollment))
        .route("/v1/auth/mfa/enroll/verify", post(confirm_enrollment))
        .route("/v1/auth/mfa/verify", post(verify_challenge))
        .route("/v1/auth/mfa/disable", post(disable_mfa))
}

/// Session payload returned to the dashboard client
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionPayload {
    user_id: String,
    email: String,
    access_token: String,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<ProviderSession> for SessionPayload {
    fn from(session: ProviderSession) -> Self {
        Self {
            user_id: session.user_id,
            email: session.email,
            access_token: session.access_token,
            expires_at: session.expires_at,
        }
    }
}

/// Sign-in response: either a usable session or an MFA continuation
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    mfa_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    factor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    challenge_window_secs: Option<u64>,
    session: SessionPayload,
}

/// Login endpoint
async fn sign_in(
    State(ctx): State<AppContext>,
    Json(req): Json<SignInRequest>,
) -> GateResult<Json<SignInResponse>> {
    req.validate()
        .map_err(|e| GateError::Validation(e.to_string()))?;

    tracing::info!(email = %req.email, "sign_in: Login attempt");
    let outcome = ctx.login.sign_in(req).await?;

    let response = match outcome {
        LoginOutcome::Success(session) => SignInResponse {
            mfa_required: false,
            factor_id: None,
            challenge_window_secs: None,
            session: session.into(),
        },
        LoginOutcome::MfaRequired { factor_id, session } => SignInResponse {
            mfa_required: true,
            factor_id: Some(factor_id),
            challenge_window_secs: Some(CHALLENGE_WINDOW_SECS),
            session: session.into(),
        },
    };

    Ok(Json(response))
}

/// Registration endpoint (allow-list restricted)
async fn sign_up(
    State(ctx): State<AppContext>,
    Json(req): Json<SignUpRequest>,
) -> GateResult<Json<serde_json::Value>> {
    req.validate()
        .map_err(|e| GateError::Validation(e.to_string()))?;

    ctx.login.sign_up(req).await?;

    Ok(Json(json!({ "status": "ok" })))
}

/// Logout endpoint
async fn sign_out(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> GateResult<Json<serde_json::Value>> {
    ctx.login.sign_out(&auth.access_token).await?;

    Ok(Json(json!({ "status": "signedOut" })))
}

/// Current account info for the settings panel
async fn me(auth: AuthContext) -> Json<serde_json::Value> {
    Json(json!({
        "userId": auth.user_id,
        "email": auth.email,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionListResponse {
    sessions: Vec<ActiveSessionInfo>,
}

/// Active sessions for the current user, newest activity first
async fn list_sessions(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> GateResult<Json<SessionListResponse>> {
    let devices = ctx.devices.list_active(&auth.user_id).await?;
    let sessions = devices.iter().map(ActiveSessionInfo::from).collect();

    Ok(Json(SessionListResponse { sessions }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeartbeatRequest {
    #[serde(default)]
    device: DeviceAttributes,
}

/// Refresh the activity timestamp for the calling device
async fn session_heartbeat(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<HeartbeatRequest>,
) -> GateResult<Json<serde_json::Value>> {
    let device_fingerprint = fingerprint::generate(&req.device);
    ctx.devices.touch(&auth.user_id, &device_fingerprint).await?;

    Ok(Json(json!({ "status": "ok" })))
}

/// Remote logout of one device
async fn terminate_session(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> GateResult<Json<serde_json::Value>> {
    tracing::info!(user_id = %auth.user_id, device = %id, "Terminating session");
    ctx.devices.deactivate(&id, &auth.user_id).await?;

    Ok(Json(json!({ "status": "terminated" })))
}

/// Delete an inactive device registration
async fn remove_device(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> GateResult<Json<serde_json::Value>> {
    ctx.devices.delete(&id, &auth.user_id).await?;

    Ok(Json(json!({ "status": "removed" })))
}

/// Verified MFA factors for the current user
async fn list_factors(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> GateResult<Json<crate::mfa::FactorList>> {
    let factors = ctx.mfa.list_factors(&auth.access_token).await?;
    Ok(Json(factors))
}

/// Start TOTP enrollment; returns the QR payload and raw secret
async fn begin_enrollment(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> GateResult<Json<EnrollmentStart>> {
    let enrollment = ctx.mfa.begin_enrollment(&auth.access_token).await?;
    Ok(Json(enrollment))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FactorCodeRequest {
    factor_id: String,
    code: String,
}

/// Confirm enrollment with the first authenticator code
async fn confirm_enrollment(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<FactorCodeRequest>,
) -> GateResult<Json<serde_json::Value>> {
    ctx.mfa
        .confirm_enrollment(&auth.access_token, &req.factor_id, &req.code)
        .await?;

    Ok(Json(json!({
        "status": "enabled",
        "message": "2FA has been successfully enabled!",
    })))
}

/// Verify a login-time (or pre-disable) TOTP challenge
async fn verify_challenge(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<FactorCodeRequest>,
) -> GateResult<Json<serde_json::Value>> {
    ctx.mfa
        .verify_challenge(&auth.access_token, &req.factor_id, &req.code)
        .await?;

    Ok(Json(json!({ "verified": true })))
}

/// Disable MFA. Demands a fresh code and verifies it before unenrolling,
/// so a stolen session alone cannot strip the second factor.
async fn disable_mfa(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<FactorCodeRequest>,
) -> GateResult<Json<serde_json::Value>> {
    ctx.mfa
        .verify_challenge(&auth.access_token, &req.factor_id, &req.code)
        .await?;
    ctx.mfa.unenroll(&auth.access_token, &req.factor_id).await?;

    Ok(Json(json!({
        "status": "disabled",
        "message": "2FA has been disabled.",
    })))
}
