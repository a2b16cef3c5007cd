//! Synapse Router Service Binary

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use synapse_common::types::wire::Task;
use synapse_common::{SynapseConfig, VERSION};
use synapse_router::{load_fleet, metrics, SynapseRuntime, TaskResult};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting Synapse Router v{}", VERSION);

    let config = SynapseConfig::load()?;
    info!("Loaded configuration: {:?}", config);

    let runtime = Arc::new(SynapseRuntime::build(config.clone()).await?);

    if let Some(path) = &config.router.agents_file {
        match load_fleet(path) {
            Ok(profiles) => {
                runtime.bootstrap_fleet(profiles).await;
            }
            Err(e) => warn!(path = %path, error = %e, "Could not read agents file"),
        }
    }

    let background = runtime.start_background();
    info!(loops = background.len(), "Background loops started");
    info!(
        "Neurogenesis: dynamic_agents={}, provisioner={}, autonomous_learning={}",
        config.enable_dynamic_agents,
        config.neurogenesis.provisioner_url.is_some(),
        config.enable_autonomous_learning
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Synapse Router listening on {}", addr);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Received shutdown signal");
    };

    axum::serve(listener, create_api(runtime))
        .with_graceful_shutdown(shutdown)
        .await?;

    for handle in background {
        handle.abort();
    }
    info!("Shutting down Synapse Router");
    Ok(())
}

fn create_api(runtime: Arc<SynapseRuntime>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(health))
        .route("/tasks", post(process_tasks))
        .route("/metrics", get(export_metrics))
        .layer(cors)
        .with_state(runtime)
}

async fn health(State(runtime): State<Arc<SynapseRuntime>>) -> Json<serde_json::Value> {
    let cache = runtime.index.cache_stats();
    Json(serde_json::json!({
        "status": "healthy",
        "service": "synapse-router",
        "version": VERSION,
        "agents": runtime.index.profiles().len(),
        "clusters": runtime.index.clusters().len(),
        "cache": cache,
        "dynamic_agents": runtime.synthesizer.can_provision(),
        "autonomous_learning": runtime.config.enable_autonomous_learning,
    }))
}

async fn process_tasks(
    State(runtime): State<Arc<SynapseRuntime>>,
    Json(tasks): Json<Vec<Task>>,
) -> Json<HashMap<String, TaskResult>> {
    Json(runtime.router.process(tasks).await)
}

async fn export_metrics(State(runtime): State<Arc<SynapseRuntime>>) -> impl IntoResponse {
    match metrics::render(&runtime.registry) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
