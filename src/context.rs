/// Application context and dependency injection
use crate::{
    config::ServerConfig,
    db,
    device::{DeviceRepository, SqliteDeviceRepository},
    error::GateResult,
    login::LoginOrchestrator,
    mfa::MfaGateway,
    provider::{AuthProvider, HttpAuthProvider},
    rate_limit::RateLimiter,
};
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub devices: Arc<dyn DeviceRepository>,
    pub mfa: MfaGateway,
    pub login: Arc<LoginOrchestrator>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> GateResult<Self> {
        // Validate configuration
        config.validate()?;

        // Initialize the device registry database
        let device_db =
            db::create_pool(&config.store.device_db, db::DatabaseOptions::default()).await?;
        db::run_migrations(&device_db).await?;
        db::test_connection(&device_db).await?;

        let devices: Arc<dyn DeviceRepository> =
            Arc::new(SqliteDeviceRepository::new(device_db.clone()));

        // External auth provider client
        let provider: Arc<dyn AuthProvider> = Arc::new(HttpAuthProvider::new(&config.provider)?);

        let mfa = MfaGateway::new(Arc::clone(&provider));

        let login = Arc::new(LoginOrchestrator::new(
            config.access.clone(),
            Arc::clone(&provider),
            Arc::clone(&devices),
            mfa.clone(),
        ));

        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        Ok(Self {
            config: Arc::new(config),
            devices,
            mfa,
            login,
            rate_limiter,
        })
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
