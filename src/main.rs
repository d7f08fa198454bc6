/// Tessera - membership association server
///
/// Member registry, membership fees per social year, events with
/// registrations, a small ledger, and public verification of membership
/// cards through QR codes.

mod account;
mod api;
mod auth;
mod config;
mod context;
mod crypto;
mod csrf;
mod db;
mod error;
mod events;
mod exports;
mod fees;
mod jobs;
mod ledger;
mod mailer;
mod members;
mod metrics;
mod rate_limit;
mod server;
mod validation;
mod verification;
mod views;

use config::ServerConfig;
use context::AppContext;
use error::AppResult;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration (also reads .env, which may set RUST_LOG)
    let config = ServerConfig::from_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.logging.level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    let bootstrap = config.bootstrap.clone();

    let ctx = AppContext::new(config).await?;

    if let Some(admin) = bootstrap {
        ctx.accounts.ensure_bootstrap_admin(&admin).await?;
    }

    // Start background jobs
    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::new(ctx.clone())));
    scheduler.start();

    server::serve(ctx).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  _______
 |__   __|
    | | ___  ___ ___  ___ _ __ __ _
    | |/ _ \/ __/ __|/ _ \ '__/ _` |
    | |  __/\__ \__ \  __/ | | (_| |
    |_|\___||___/___/\___|_|  \__,_|

        Membership association server v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
