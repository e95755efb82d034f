/// Concurrent-session ceiling
use crate::{
    device::{AuthorizedDevice, DeviceRepository},
    error::GateResult,
};
use std::sync::Arc;

/// Maximum number of devices that may hold a live session at once
pub const MAX_CONCURRENT_SESSIONS: usize = 3;

/// Outcome of a session-limit evaluation
#[derive(Debug, Clone)]
pub struct SessionLimitVerdict {
    pub limit_reached: bool,
    pub active_sessions: Vec<AuthorizedDevice>,
    /// The candidate fingerprint already holds one of the active sessions;
    /// a re-login from it never breaches the ceiling.
    pub is_reauth_of_existing_device: bool,
}

/// Decides whether a new login may proceed given existing active sessions
#[derive(Clone)]
pub struct SessionLimitPolicy {
    devices: Arc<dyn DeviceRepository>,
}

impl SessionLimitPolicy {
    pub fn new(devices: Arc<dyn DeviceRepository>) -> Self {
        Self { devices }
    }

    /// Evaluate the ceiling for a login attempt.
    ///
    /// Store errors propagate: if the session count cannot be verified the
    /// login attempt fails closed.
    pub async fn evaluate(
        &self,
        user_id: &str,
        candidate_fingerprint: &str,
    ) -> GateResult<SessionLimitVerdict> {
        let active_sessions = self.devices.list_active(user_id).await?;

        // A device that already holds one of the active sessions is
        // re-logging-in, not opening an additional one.
        let is_reauth = active_sessions
            .iter()
            .any(|session| session.device_fingerprint == candidate_fingerprint);

        if is_reauth {
            return Ok(SessionLimitVerdict {
                limit_reached: false,
                active_sessions,
                is_reauth_of_existing_device: true,
            });
        }

        let limit_reached = active_sessions.len() >= MAX_CONCURRENT_SESSIONS;

        Ok(SessionLimitVerdict {
            limit_reached,
            active_sessions,
            is_reauth_of_existing_device: false,
        })
    }
}
