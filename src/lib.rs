//! nexos-compat - A compatibility proxy for the nexos.ai gateway
//!
//! The gateway fronts several model providers behind one OpenAI-style endpoint, but each provider
//! family bends the Chat Completions contract differently. This library sits between a client and
//! the gateway: it normalizes outgoing chat completion requests per provider family, converts the
//! Codex family to and from the Responses protocol, and repairs streamed responses, so callers
//! only ever deal with plain Chat Completions.

use axum::Router;
use axum::routing::any;
use axum_prometheus::{
    GenericMetricLayer, Handle, PrometheusMetricLayerBuilder,
    metrics_exporter_prometheus::PrometheusHandle,
};
use std::borrow::Cow;
use tracing::{info, instrument};

pub mod client;
pub mod codex;
pub mod errors;
pub mod family;
pub mod handlers;
pub mod normalize;
pub mod pipeline;
pub mod rewrite;
pub mod schema;
pub mod schemas;
pub mod sse;
pub mod upstream;

use client::{HttpClient, HyperClient, PoolConfig};
use handlers::proxy_handler;
use upstream::Upstream;

/// The main application state containing the HTTP client and the upstream gateway
#[derive(Clone, Debug)]
pub struct AppState<T: HttpClient> {
    pub http_client: T,
    pub upstream: Upstream,
}

impl AppState<HyperClient> {
    /// Create a new AppState with the default Hyper client
    pub fn new(upstream: Upstream, pool: PoolConfig) -> Self {
        Self {
            http_client: client::create_hyper_client(pool),
            upstream,
        }
    }
}

impl<T: HttpClient> AppState<T> {
    /// Create a new AppState with a custom HTTP client (useful for testing)
    pub fn with_client(upstream: Upstream, http_client: T) -> Self {
        Self {
            http_client,
            upstream,
        }
    }
}

/// Build the main router for the proxy
///
/// Every path is forwarded to the upstream; chat completion calls are prepared on the way.
#[instrument(skip(state))]
pub fn build_router<T: HttpClient + Clone + Send + Sync + 'static>(state: AppState<T>) -> Router {
    info!("Building router");
    Router::new()
        .route("/{*path}", any(proxy_handler))
        .with_state(state)
}

/// Builds a router for the metrics endpoint.
#[instrument(skip(handle))]
pub fn build_metrics_router(handle: PrometheusHandle) -> Router {
    info!("Building metrics router");
    Router::new().route(
        "/metrics",
        axum::routing::get(move || async move { handle.render() }),
    )
}

type MetricsLayerAndHandle = (
    GenericMetricLayer<'static, PrometheusHandle, Handle>,
    PrometheusHandle,
);

/// Builds a layer and handle for prometheus metrics collection.
///
/// `prefix` is prepended to every metric name; it has to live for the whole program because the
/// recorder is global.
pub fn build_metrics_layer_and_handle(
    prefix: impl Into<Cow<'static, str>>,
) -> MetricsLayerAndHandle {
    info!("Building metrics layer");
    PrometheusMetricLayerBuilder::new()
        .with_prefix(prefix)
        .enable_response_body_size(true)
        .with_endpoint_label_type(axum_prometheus::EndpointLabel::Exact)
        .with_default_metrics()
        .build_pair()
}
