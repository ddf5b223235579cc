use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use oa_point_backend::{
    config::{get_config, init_config, LogFormat},
    database::pool::{create_pool, run_migrations},
    middleware::rate_limit::RateLimiter,
    routes,
    services::{
        code_executor::HttpJudgeExecutor,
        violation_service::{ViolationService, ViolationWriter},
    },
    AppState,
};
use reqwest::Client;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

const VIOLATION_QUEUE_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_config()?;
    let config = get_config();
    init_tracing(config.log_format);

    let pool = create_pool().await?;
    run_migrations(&pool).await?;

    let http_client = Client::builder()
        .timeout(Duration::from_secs(config.judge_timeout_secs))
        .build()?;
    let executor = Arc::new(HttpJudgeExecutor::new(config.judge_url.clone(), http_client));

    let (violations, violation_rx) = ViolationService::channel(VIOLATION_QUEUE_CAPACITY);
    tokio::spawn(ViolationWriter::new(pool.clone(), violation_rx).run());

    let app_state = AppState::new(pool, config, executor, violations);

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        app_state.user_service.ensure_admin(email, password).await?;
    }

    let limiter = RateLimiter::new(
        config.rate_limit_per_ip,
        Duration::from_secs(config.rate_limit_window_secs),
        config.rate_limit_max_entries,
    );
    limiter.spawn_sweeper(Duration::from_secs(config.rate_limit_window_secs.max(1)));

    let app = routes::router(app_state, limiter);

    let addr: SocketAddr = config.server_address.parse()?;
    info!(
        %addr,
        enforce_deadlines = config.enforce_deadlines,
        "Server listening"
    );
    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,sqlx=warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
