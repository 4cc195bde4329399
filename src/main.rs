use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing::post};
use library_backend::{
    AppState,
    config::Config,
    middleware::{CorsPolicy, RateLimiter, cors, rate_limit},
    notify::Notifier,
    routes,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'library_backend';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    let notifier = Arc::new(Notifier::new(&config));
    let state = AppState {
        pool,
        config: config.clone(),
        notifier,
    };

    let rate_limiter = Arc::new(RateLimiter::new(&config));
    let cors_policy = Arc::new(CorsPolicy::new(&config));

    // Periodic garbage collection of expired rate-limit records.
    let sweeper = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sweeper.sweep();
        }
    });

    let api_routes = Router::new()
        .route("/ingest", post(routes::ingest::ingest))
        .route("/submit", post(routes::submit::submit));

    // The CORS gate wraps the rate limiter so preflights are answered
    // before any quota is spent and limited responses still carry the
    // cross-origin headers.
    let router = Router::new()
        .nest("/api", api_routes)
        .layer(axum::middleware::from_fn_with_state(
            rate_limiter.clone(),
            rate_limit,
        ))
        .layer(axum::middleware::from_fn_with_state(cors_policy, cors));

    let app = router.with_state(state.clone());

    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app,
    )
    .await
    .expect("Failed to start server");
}
