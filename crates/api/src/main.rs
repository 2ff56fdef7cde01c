//! API server entry point.
//!
//! `api` serves HTTP. `api issue-token <user-id> <email> [--admin]` prints a
//! bearer token signed with the configured secret.

use std::sync::Arc;

use api::{AppState, Config, TokenIssuer};
use checkout::{
    InMemoryPaymentProcessor, PaymentProcessor, StripeConfig, StripePaymentProcessor,
};
use common::UserId;
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use storage::{CheckoutStore, InMemoryStore, PostgresStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Builds the state for one store/processor pairing and serves until shutdown.
async fn serve<S, P>(config: &Config, store: S, processor: P, metrics_handle: PrometheusHandle)
where
    S: CheckoutStore + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    let tokens = TokenIssuer::new(config.jwt_secret.clone(), config.jwt_ttl);
    let state = Arc::new(AppState::new(
        store,
        processor,
        config.checkout.clone(),
        tokens,
    ));
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

async fn serve_with_processor<S>(config: &Config, store: S, metrics_handle: PrometheusHandle)
where
    S: CheckoutStore + Clone + 'static,
{
    match &config.stripe_secret_key {
        Some(secret_key) => {
            let processor = StripePaymentProcessor::new(StripeConfig {
                secret_key: secret_key.clone(),
                api_base: config.stripe_api_base.clone(),
            });
            serve(config, store, processor, metrics_handle).await;
        }
        None => {
            tracing::warn!("STRIPE_SECRET_KEY not set, using the in-memory payment processor");
            serve(config, store, InMemoryPaymentProcessor::new(), metrics_handle).await;
        }
    }
}

fn issue_token(config: &Config, args: &[String]) {
    let (Some(user_id), Some(email)) = (args.first(), args.get(1)) else {
        eprintln!("usage: api issue-token <user-id> <email> [--admin]");
        std::process::exit(2);
    };

    let user_id = UserId::parse(user_id).expect("user id must be a UUID");
    let is_admin = args.iter().any(|arg| arg == "--admin");
    let token = TokenIssuer::new(config.jwt_secret.clone(), config.jwt_ttl)
        .issue(user_id, email, is_admin)
        .expect("failed to sign token");

    println!("{token}");
}

#[tokio::main]
async fn main() {
    // 1. Load .env (if present) and configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("invalid configuration");

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("issue-token") {
        issue_token(&config, &args[1..]);
        return;
    }

    // 2. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if !config.jwt_secret_configured {
        tracing::warn!("JWT_SECRET not set, using the development signing secret");
    }

    // 3. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 4. Pick the store and serve
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await
                .expect("failed to connect to Postgres");
            let store = PostgresStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using Postgres store");
            serve_with_processor(&config, store, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            serve_with_processor(&config, InMemoryStore::new(), metrics_handle).await;
        }
    }
}
