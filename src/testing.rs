/// In-memory fakes for the repository and provider seams.
///
/// The session-limit policy and login orchestrator are exercised against
/// these instead of a live store or auth provider.
use crate::{
    device::{AuthorizedDevice, DeviceRepository, NewDevice},
    error::{GateError, GateResult},
    provider::{
        AuthProvider, FactorStatus, ProviderSession, TotpChallenge, TotpEnrollment, TotpFactor,
    },
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

fn store_error() -> GateError {
    GateError::Store(sqlx::Error::PoolClosed)
}

/// Device repository over a plain Vec
pub struct MemoryDeviceRepository {
    rows: Mutex<Vec<AuthorizedDevice>>,
    calls: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryDeviceRepository {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of repository calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn all_rows(&self) -> Vec<AuthorizedDevice> {
        self.rows.lock().await.clone()
    }

    pub async fn active_count(&self, user_id: &str) -> usize {
        self.rows
            .lock()
            .await
            .iter()
            .filter(|d| d.user_id == user_id && d.is_active)
            .count()
    }

    /// Plant an already-active device row
    pub async fn seed_active(&self, user_id: &str, fingerprint: &str, token: &str, name: &str) {
        let now = Utc::now();
        self.rows.lock().await.push(AuthorizedDevice {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            device_id: Uuid::new_v4().to_string(),
            device_fingerprint: fingerprint.to_string(),
            device_name: name.to_string(),
            browser: "Chrome".to_string(),
            os: "macOS".to_string(),
            platform: "desktop".to_string(),
            is_active: true,
            session_token: Some(token.to_string()),
            created_at: now,
            last_used_at: now,
        });
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DeviceRepository for MemoryDeviceRepository {
    async fn list_active(&self, user_id: &str) -> GateResult<Vec<AuthorizedDevice>> {
        self.record_call();
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(store_error());
        }
        let mut rows: Vec<AuthorizedDevice> = self
            .rows
            .lock()
            .await
            .iter()
            .filter(|d| d.user_id == user_id && d.is_active)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));
        Ok(rows)
    }

    async fn find_by_fingerprint(
        &self,
        user_id: &str,
        fingerprint: &str,
    ) -> GateResult<Option<AuthorizedDevice>> {
        self.record_call();
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(store_error());
        }
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .find(|d| d.user_id == user_id && d.device_fingerprint == fingerprint)
            .cloned())
    }

    async fn insert(&self, device: NewDevice) -> GateResult<AuthorizedDevice> {
        self.record_call();
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(store_error());
        }
        let now = Utc::now();
        let row = AuthorizedDevice {
            id: Uuid::new_v4().to_string(),
            user_id: device.user_id,
            device_id: device.device_id,
            device_fingerprint: device.device_fingerprint,
            device_name: device.device_name,
            browser: device.browser,
            os: device.os,
            platform: device.platform,
            is_active: true,
            session_token: Some(device.session_token),
            created_at: now,
            last_used_at: now,
        };
        self.rows.lock().await.push(row.clone());
        Ok(row)
    }

    async fn activate(&self, id: &str, session_token: &str) -> GateResult<()> {
        self.record_call();
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(store_error());
        }
        let mut rows = self.rows.lock().await;
        if let Some(row) = rows.iter_mut().find(|d| d.id == id) {
            row.is_active = true;
            row.session_token = Some(session_token.to_string());
            row.last_used_at = Utc::now();
        }
        Ok(())
    }

    async fn deactivate(&self, id: &str, user_id: &str) -> GateResult<()> {
        self.record_call();
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(store_error());
        }
        let mut rows = self.rows.lock().await;
        if let Some(row) = rows
            .iter_mut()
            .find(|d| d.id == id && d.user_id == user_id)
        {
            row.is_active = false;
            row.session_token = None;
        }
        Ok(())
    }

    async fn deactivate_by_session(&self, session_token: &str) -> GateResult<()> {
        self.record_call();
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(store_error());
        }
        let mut rows = self.rows.lock().await;
        for row in rows
            .iter_mut()
            .filter(|d| d.session_token.as_deref() == Some(session_token))
        {
            row.is_active = false;
            row.session_token = None;
        }
        Ok(())
    }

    async fn delete(&self, id: &str, user_id: &str) -> GateResult<()> {
        self.record_call();
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(store_error());
        }
        let mut rows = self.rows.lock().await;
        let Some(position) = rows
            .iter()
            .position(|d| d.id == id && d.user_id == user_id)
        else {
            return Err(GateError::NotFound("Device not found".to_string()));
        };
        if rows[position].is_active {
            return Err(GateError::Validation(
                "Device must be signed out before it can be removed".to_string(),
            ));
        }
        rows.remove(position);
        Ok(())
    }

    async fn touch(&self, user_id: &str, fingerprint: &str) -> GateResult<()> {
        self.record_call();
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(store_error());
        }
        let mut rows = self.rows.lock().await;
        for row in rows.iter_mut().filter(|d| {
            d.user_id == user_id && d.device_fingerprint == fingerprint && d.is_active
        }) {
            row.last_used_at = Utc::now();
        }
        Ok(())
    }
}

struct FakeAccount {
    user_id: String,
    email: String,
    password: String,
}

struct FakeFactor {
    factor: TotpFactor,
}

/// Auth provider fake with a deterministic "current" TOTP code
pub struct MemoryAuthProvider {
    accounts: Mutex<Vec<FakeAccount>>,
    factors: Mutex<Vec<FakeFactor>>,
    challenges: Mutex<Vec<String>>,
    sessions: Mutex<Vec<String>>,
    signed_out: Mutex<Vec<String>>,
    sign_ins: AtomicUsize,
    code: Mutex<String>,
}

impl MemoryAuthProvider {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(Vec::new()),
            factors: Mutex::new(Vec::new()),
            challenges: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
            signed_out: Mutex::new(Vec::new()),
            sign_ins: AtomicUsize::new(0),
            code: Mutex::new("424242".to_string()),
        }
    }

    /// Provider with one registered account
    pub fn with_password(email: &str, password: &str) -> Self {
        let mut provider = Self::new();
        provider.accounts = Mutex::new(vec![FakeAccount {
            user_id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }]);
        provider
    }

    pub async fn user_id(&self, email: &str) -> String {
        self.accounts
            .lock()
            .await
            .iter()
            .find(|a| a.email == email)
            .map(|a| a.user_id.clone())
            .expect("unknown account")
    }

    /// Hand out a session token without going through the password check
    pub async fn issue_session(&self, email: &str) -> String {
        let token = format!("tok-{}", Uuid::new_v4());
        self.sessions.lock().await.push(token.clone());
        let mut accounts = self.accounts.lock().await;
        if !accounts.iter().any(|a| a.email == email) {
            accounts.push(FakeAccount {
                user_id: Uuid::new_v4().to_string(),
                email: email.to_string(),
                password: String::new(),
            });
        }
        token
    }

    pub async fn sign_in_calls(&self) -> usize {
        self.sign_ins.load(Ordering::SeqCst)
    }

    pub async fn signed_out_tokens(&self) -> Vec<String> {
        self.signed_out.lock().await.clone()
    }

    /// Sessions issued and not yet signed out
    pub async fn live_session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// The code the next verification will accept
    pub async fn current_code(&self) -> String {
        self.code.lock().await.clone()
    }

    pub async fn factors_with_status(&self, status: FactorStatus) -> Vec<String> {
        self.factors
            .lock()
            .await
            .iter()
            .filter(|f| f.factor.status == status)
            .map(|f| f.factor.id.clone())
            .collect()
    }

    /// Plant a verified factor, as if enrollment completed earlier
    pub async fn seed_verified_factor(&self) -> String {
        let id = format!("factor-{}", Uuid::new_v4());
        self.factors.lock().await.push(FakeFactor {
            factor: TotpFactor {
                id: id.clone(),
                friendly_name: "Authenticator".to_string(),
                status: FactorStatus::Verified,
            },
        });
        id
    }
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> GateResult<ProviderSession> {
        self.sign_ins.fetch_add(1, Ordering::SeqCst);

        let accounts = self.accounts.lock().await;
        let account = accounts
            .iter()
            .find(|a| a.email == email && a.password == password)
            .ok_or_else(|| {
                GateError::CredentialRejected("Invalid login credentials".to_string())
            })?;

        let token = format!("tok-{}", Uuid::new_v4());
        self.sessions.lock().await.push(token.clone());

        Ok(ProviderSession {
            user_id: account.user_id.clone(),
            email: account.email.clone(),
            access_token: token,
            expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
        })
    }

    async fn sign_up_with_password(&self, email: &str, password: &str) -> GateResult<()> {
        let mut accounts = self.accounts.lock().await;
        if accounts.iter().any(|a| a.email == email) {
            return Err(GateError::Provider("Email already registered".to_string()));
        }
        accounts.push(FakeAccount {
            user_id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            password: password.to_string(),
        });
        Ok(())
    }

    async fn sign_out(&self, access_token: &str) -> GateResult<()> {
        self.sessions.lock().await.retain(|t| t != access_token);
        self.signed_out.lock().await.push(access_token.to_string());
        Ok(())
    }

    async fn enroll_totp(
        &self,
        _access_token: &str,
        friendly_name: &str,
    ) -> GateResult<TotpEnrollment> {
        let id = format!("factor-{}", Uuid::new_v4());
        self.factors.lock().await.push(FakeFactor {
            factor: TotpFactor {
                id: id.clone(),
                friendly_name: friendly_name.to_string(),
                status: FactorStatus::Unverified,
            },
        });
        Ok(TotpEnrollment {
            factor_id: id.clone(),
            qr_payload: format!("otpauth://totp/Subguard?secret=SECRET&issuer={}", id),
            shared_secret: "JBSWY3DPEHPK3PXP".to_string(),
        })
    }

    async fn create_challenge(
        &self,
        _access_token: &str,
        factor_id: &str,
    ) -> GateResult<TotpChallenge> {
        if !self
            .factors
            .lock()
            .await
            .iter()
            .any(|f| f.factor.id == factor_id)
        {
            return Err(GateError::Provider("Factor not found".to_string()));
        }
        let id = format!("challenge-{}", Uuid::new_v4());
        self.challenges.lock().await.push(id.clone());
        Ok(TotpChallenge {
            id,
            expires_at: Utc::now() + chrono::Duration::seconds(30),
        })
    }

    async fn verify_challenge(
        &self,
        _access_token: &str,
        factor_id: &str,
        challenge_id: &str,
        code: &str,
    ) -> GateResult<()> {
        // A challenge is single-use: it must exist and is consumed here
        let mut challenges = self.challenges.lock().await;
        let Some(position) = challenges.iter().position(|c| c == challenge_id) else {
            return Err(GateError::InvalidMfaCode("Unknown challenge".to_string()));
        };
        challenges.remove(position);
        drop(challenges);

        if code != self.code.lock().await.as_str() {
            return Err(GateError::InvalidMfaCode(
                "Invalid code. Please try again.".to_string(),
            ));
        }

        let mut factors = self.factors.lock().await;
        if let Some(factor) = factors.iter_mut().find(|f| f.factor.id == factor_id) {
            factor.factor.status = FactorStatus::Verified;
        }
        Ok(())
    }

    async fn unenroll_factor(&self, _access_token: &str, factor_id: &str) -> GateResult<()> {
        self.factors
            .lock()
            .await
            .retain(|f| f.factor.id != factor_id);
        Ok(())
    }

    async fn list_factors(&self, _access_token: &str) -> GateResult<Vec<TotpFactor>> {
        Ok(self
            .factors
            .lock()
            .await
            .iter()
            .map(|f| f.factor.clone())
            .collect())
    }
}
