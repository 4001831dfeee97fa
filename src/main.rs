mod config;

use clap::Parser as _;
use config::Config;
use nexos_compat::{
    AppState, build_metrics_layer_and_handle, build_metrics_router, build_router,
    upstream::Upstream,
};
use tokio::net::TcpListener;
use tracing::{info, instrument};

#[tokio::main]
#[instrument]
pub async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse().validate()?;
    info!("Starting nexos-compat with config: {:?}", config);

    let upstream = Upstream::builder().url(config.upstream_url.clone()).build();
    let app_state = AppState::new(upstream, config.pool());
    let mut router = build_router(app_state);

    if config.metrics {
        let (prometheus_layer, handle) =
            build_metrics_layer_and_handle(config.metrics_prefix.clone());
        router = router.layer(prometheus_layer);

        let metrics_addr = format!("0.0.0.0:{}", config.metrics_port);
        let metrics_listener = TcpListener::bind(&metrics_addr).await?;
        info!("Metrics endpoint listening on {}", metrics_addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(metrics_listener, build_metrics_router(handle)).await {
                tracing::error!("Metrics server failed: {}", e);
            }
        });
    }

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("nexos-compat listening on {}, forwarding to {}", bind_addr, config.upstream_url);

    axum::serve(listener, router).await?;

    Ok(())
}
