/// Metrics and telemetry for the login gate
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - Login attempts by outcome
/// - TOTP challenge verifications
/// - Compensating sign-outs after denied attempts
use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    /// Login attempts by outcome (success, mfa_required, denied)
    pub static ref LOGIN_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "login_attempts_total",
        "Total number of login attempts by outcome",
        &["outcome"]
    )
    .unwrap();

    /// TOTP challenge verifications by result (accepted, rejected)
    pub static ref MFA_VERIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "mfa_verifications_total",
        "Total number of TOTP challenge verifications by result",
        &["result"]
    )
    .unwrap();

    /// Provider sessions signed back out after a denied login attempt
    pub static ref COMPENSATING_SIGNOUTS_TOTAL: IntCounter = register_int_counter!(
        "compensating_signouts_total",
        "Total number of compensating sign-outs on denied login attempts"
    )
    .unwrap();
}

/// Render all registered metrics in the Prometheus text format
pub fn encode() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
