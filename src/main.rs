//! Admin Server
//!
//! Serves sign-in/sign-out and user records for the admin console.
//!
//! Usage:
//!   admin-server --port 8083 --db-path admin_backend.db
//!
//! Every flag also reads from the environment; see `config.rs`.

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::{future::IntoFuture, net::SocketAddr, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use admin_backend::{
    api::{create_router, AppState},
    auth::{JwtHandler, TokenBlacklist},
    config::AppConfig,
    middleware::{CorsPolicy, IpRateLimiter},
    shutdown::{self, Shutdown},
    users::SqliteUserStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let config = AppConfig::parse();
    config.validate().context("Invalid configuration")?;

    info!("🚀 Admin backend starting");

    let store = SqliteUserStore::open(&config.db_path)
        .with_context(|| format!("Failed to open user database at {}", config.db_path))?;
    info!(path = %config.db_path, "📦 User database ready");

    if let Some((email, password)) = config.bootstrap_admin() {
        let created = store
            .ensure_admin(&config.admin_name, email, password)
            .context("Failed to seed admin account")?;
        if created {
            info!(email, "👤 Seeded superadmin account");
        }
    }

    let state = AppState {
        users: Arc::new(store),
        jwt: Arc::new(JwtHandler::with_ttl(&config.jwt_secret, config.token_ttl())),
        blacklist: Arc::new(TokenBlacklist::new()),
        limiter: Arc::new(IpRateLimiter::new(config.rate_limit())),
        cors: Arc::new(CorsPolicy::new(config.cors_allowed_origins.clone())),
    };
    info!(
        ttl_hours = state.jwt.ttl().num_hours(),
        origins = ?state.cors.origins(),
        "🔑 Sessions and CORS configured"
    );
    let app = create_router(&state);

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("🎯 API server listening on {}", addr);

    let shutdown = Shutdown::new();
    let mut server = tokio::spawn(
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown.notified())
        .into_future(),
    );

    tokio::select! {
        _ = shutdown::wait_for_signal() => {}
        exited = &mut server => {
            // Stopped without a shutdown signal
            return exited.context("Server task failed")?.context("Server error");
        }
    }

    info!("🛑 Shutting down");
    shutdown.trigger();

    match shutdown::drain(server, config.shutdown_grace())
        .await
        .context("Server task failed")?
    {
        Some(result) => {
            result.context("Server error")?;
            info!("✅ Server stopped cleanly");
        }
        None => warn!("Server aborted after grace period"),
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "admin_backend=debug,admin_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // cwd and parents first, then the crate root when launched from elsewhere
    let _ = dotenv();

    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
