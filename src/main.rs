mod config;
mod models;
mod services;
mod sources;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use tokio::time::{interval, Duration};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use models::{PriceResult, SourceStatus};
use services::PriceEngine;

pub struct AppState {
    pub engine: Arc<PriceEngine>,
    pub tracked: Vec<String>,
}

#[tokio::main(worker_threads = 4)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,price_discovery=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("\n🚀 Price Discovery Service Starting...\n");

    // Load configuration; the service must come up with zero config
    let config = match Config::load() {
        Ok(cfg) => {
            tracing::info!("✓ Configuration loaded");
            cfg
        }
        Err(e) => {
            tracing::warn!("config.toml not loaded ({}), using defaults", e);
            Config::default()
        }
    };

    let engine = Arc::new(PriceEngine::new(&config));
    tracing::info!("✓ {} price sources registered", engine.registry().len());

    // Background: circuit-breaker reactivation sweep
    let engine_sweep = engine.clone();
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(10));
        loop {
            ticker.tick().await;
            engine_sweep
                .limiter()
                .reactivate_expired(engine_sweep.registry());
        }
    });

    // Background: cache cleanup
    let engine_cleanup = engine.clone();
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            engine_cleanup.cache().cleanup_if_needed();
        }
    });

    // Background: keep tracked symbols warm
    let tracked = config.discovery.tracked_symbols.clone();
    if !tracked.is_empty() {
        println!(
            "📥 Warming {} tracked symbols ({}s cycle)...\n",
            tracked.len(),
            config.discovery.refresh_interval_secs
        );
        let engine_warm = engine.clone();
        let symbols = tracked.clone();
        let refresh = config.discovery.refresh_interval_secs;
        tokio::spawn(async move {
            loop {
                for symbol in &symbols {
                    let _ = engine_warm.get_token_price(symbol).await;
                }
                tracing::info!(
                    "✓ Refresh cycle complete: {} symbols | {} cached",
                    symbols.len(),
                    engine_warm.cache().len()
                );
                tokio::time::sleep(Duration::from_secs(refresh)).await;
            }
        });
    }

    // Application state
    let state = Arc::new(AppState { engine, tracked });

    // Router
    let app = Router::new()
        .route("/price/:symbol", get(get_price))
        .route("/sources", get(get_sources))
        .route("/stats", get(get_stats))
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    println!("\n✓ Server ready on http://{}\n", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// REST Handlers
async fn get_price(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
) -> axum::Json<PriceResult> {
    axum::Json(state.engine.price_result(&symbol).await)
}

async fn get_sources(State(state): State<Arc<AppState>>) -> axum::Json<Vec<SourceStatus>> {
    axum::Json(state.engine.source_status())
}

async fn get_stats(State(state): State<Arc<AppState>>) -> axum::Json<serde_json::Value> {
    let stats = state.engine.fetch_stats();

    axum::Json(serde_json::json!({
        "cached_symbols": state.engine.cache().len(),
        "tracked_symbols": state.tracked.len(),
        "sources": state.engine.registry().len(),
        "requests_attempted": stats.attempted.load(Ordering::Relaxed),
        "requests_succeeded": stats.succeeded.load(Ordering::Relaxed),
        "requests_failed": stats.failed.load(Ordering::Relaxed),
        "requests_refused": stats.refused.load(Ordering::Relaxed),
    }))
}

async fn health() -> &'static str {
    "OK"
}

// WebSocket Handler
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut update_ticker = interval(Duration::from_secs(30));
    let mut heartbeat_ticker = interval(Duration::from_secs(10));

    loop {
        tokio::select! {
            _ = update_ticker.tick() => {
                let prices: Vec<serde_json::Value> = state.engine.cache().snapshot()
                    .into_iter()
                    .map(|(symbol, price, age_secs)| serde_json::json!({
                        "symbol": symbol,
                        "price": price,
                        "age_secs": age_secs,
                    }))
                    .collect();

                let msg = serde_json::json!({
                    "type": "price_update",
                    "data": prices,
                });
                match tokio::time::timeout(
                    Duration::from_secs(5),
                    sender.send(Message::Text(msg.to_string()))
                ).await {
                    Ok(Ok(_)) => {},
                    _ => return,
                }

                let msg = serde_json::json!({
                    "type": "source_status",
                    "data": state.engine.source_status(),
                });
                if sender.send(Message::Text(msg.to_string())).await.is_err() {
                    return;
                }
            }

            _ = heartbeat_ticker.tick() => {
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    return;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Ok(Message::Pong(_))) => {},
                    _ => {}
                }
            }
        }
    }
}
