/// Device fingerprinting
///
/// Derives a stable identifier for a browser/OS/hardware combination from
/// the attribute record submitted with a sign-in attempt. The same device
/// always yields the same value so it can be recognized on return visits;
/// there is deliberately no salt.
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Browser and system attributes reported by the dashboard client.
///
/// Every field defaults to an empty/zero value; a client that cannot
/// determine an attribute still fingerprints, just less uniquely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceAttributes {
    pub browser: String,
    pub browser_version: String,
    pub os: String,
    pub os_version: String,
    pub platform: String,
    pub user_agent: String,
    pub language: String,
    pub screen_resolution: String,
    pub timezone: String,
    pub cookie_enabled: bool,
    pub hardware_concurrency: u32,
}

impl DeviceAttributes {
    /// Human-readable device label stored alongside the registration
    pub fn device_name(&self) -> String {
        let browser = if self.browser.is_empty() {
            "Unknown browser"
        } else {
            self.browser.as_str()
        };
        let os = if self.os.is_empty() {
            "unknown OS"
        } else {
            self.os.as_str()
        };
        format!("{} on {}", browser, os)
    }
}

/// Generate the device fingerprint for an attribute record.
///
/// The record is serialized in canonical (struct-declaration) field order,
/// digested with SHA-256 and returned as lowercase hex. Deterministic and
/// non-invertible.
pub fn generate(attributes: &DeviceAttributes) -> String {
    // Struct serialization order is fixed, so the serialized form is
    // canonical without any extra sorting.
    let serialized =
        serde_json::to_string(attributes).unwrap_or_else(|_| String::from("{}"));

    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    hex::encode(hasher.finalize())
}
