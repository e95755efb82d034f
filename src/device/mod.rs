/// Device authorization registry
///
/// Tracks which devices a user has logged in from and which of them hold a
/// live session. The (user_id, device_fingerprint) pair is the natural key;
/// the store-assigned id is a surrogate.
mod policy;
mod registry;

pub use policy::{SessionLimitPolicy, SessionLimitVerdict, MAX_CONCURRENT_SESSIONS};
pub use registry::SqliteDeviceRepository;

use crate::error::GateResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One registration of a device for a user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizedDevice {
    /// Surrogate identifier assigned by the store
    pub id: String,
    pub user_id: String,
    /// Client-persisted installation id; display/audit only
    pub device_id: String,
    /// Stable hash recognizing the same device across logins
    pub device_fingerprint: String,
    pub device_name: String,
    pub browser: String,
    pub os: String,
    pub platform: String,
    /// True while a session tied to this device is considered logged in
    pub is_active: bool,
    /// Set if and only if `is_active` is true
    pub session_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// Fields for a first-time device registration
#[derive(Debug, Clone)]
pub struct NewDevice {
    pub user_id: String,
    pub device_id: String,
    pub device_fingerprint: String,
    pub device_name: String,
    pub browser: String,
    pub os: String,
    pub platform: String,
    pub session_token: String,
}

/// Active session entry shown on the settings surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSessionInfo {
    pub id: String,
    pub device_name: String,
    pub browser: String,
    pub os: String,
    pub platform: String,
    pub last_used_at: DateTime<Utc>,
}

impl From<&AuthorizedDevice> for ActiveSessionInfo {
    fn from(device: &AuthorizedDevice) -> Self {
        Self {
            id: device.id.clone(),
            device_name: device.device_name.clone(),
            browser: device.browser.clone(),
            os: device.os.clone(),
            platform: device.platform.clone(),
            last_used_at: device.last_used_at,
        }
    }
}

/// Storage operations over the `authorized_devices` relation.
///
/// Every query is scoped by `user_id`; callers never see another user's
/// rows. A missing row is a normal `None`/no-op, not an error.
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// All rows with `is_active = true` for a user, newest activity first
    async fn list_active(&self, user_id: &str) -> GateResult<Vec<AuthorizedDevice>>;

    /// Canonical record for a (user, fingerprint) pair, active or not
    async fn find_by_fingerprint(
        &self,
        user_id: &str,
        fingerprint: &str,
    ) -> GateResult<Option<AuthorizedDevice>>;

    /// Register a device; the row starts active with the given session token
    async fn insert(&self, device: NewDevice) -> GateResult<AuthorizedDevice>;

    /// Mark a known device active, bind the session token, refresh activity
    async fn activate(&self, id: &str, session_token: &str) -> GateResult<()>;

    /// Clear `is_active`/`session_token` for one of the user's devices.
    /// A second call is a no-op.
    async fn deactivate(&self, id: &str, user_id: &str) -> GateResult<()>;

    /// Clear `is_active`/`session_token` on whichever row holds this
    /// session token. A second call is a no-op.
    async fn deactivate_by_session(&self, session_token: &str) -> GateResult<()>;

    /// Remove a row. Only inactive rows may be deleted.
    async fn delete(&self, id: &str, user_id: &str) -> GateResult<()>;

    /// Refresh `last_used_at` on the user's active row for a fingerprint
    async fn touch(&self, user_id: &str, fingerprint: &str) -> GateResult<()>;
}
