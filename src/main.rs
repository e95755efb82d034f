/// Subguard - device-aware login gate
///
/// Backend for a subscription-management admin dashboard: authenticates the
/// operator account against an external auth provider, enforces a
/// concurrent-device ceiling over a device registry, and gates logins
/// behind TOTP when a second factor is enrolled.
mod api;
mod auth;
mod config;
mod context;
mod db;
mod device;
mod error;
mod fingerprint;
mod login;
mod metrics;
mod mfa;
mod provider;
mod rate_limit;
mod server;
#[cfg(test)]
mod testing;

use config::ServerConfig;
use context::AppContext;
use error::GateResult;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> GateResult<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "subguard=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    // Load configuration
    let config = ServerConfig::from_env()?;

    // Create application context
    let ctx = AppContext::new(config).await?;

    // Start server
    server::serve(ctx).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
   _____       __                              __
  / ___/__  __/ /_  ____ ___  ______ __________/ /
  \__ \/ / / / __ \/ __ `/ / / / __ `/ ___/ __  /
 ___/ / /_/ / /_/ / /_/ / /_/ / /_/ / /  / /_/ /
/____/\__,_/_.___/\__, /\__,_/\__,_/_/   \__,_/
                 /____/
        Device-aware login gate v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
