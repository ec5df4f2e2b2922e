//! Tipline webhook gateway.
//!
//! Exposes the channel webhook endpoint, verifies the channel signature
//! over the raw body, and feeds deliveries through the event processor.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use case_core::{async_trait, CollaboratorError, ReplySender};
use hmac::{Hmac, Mac};
use listener::{EventProcessor, ProcessResult};
use pipeline::{MaterializationPolicy, Pipeline, PipelineConfig};
use serde_json::json;
use sha2::Sha256;
use tipline_database::Database;
use tracing::{error, info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the channel's HMAC-SHA256 signature of the raw body.
const SIGNATURE_HEADER: &str = "x-channel-signature";

/// How often idle sessions are pruned.
const PRUNE_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Clone)]
struct AppState {
    processor: Arc<EventProcessor<ChannelReplySender>>,
    channel_secret: Option<String>,
}

/// Reply sender that posts acknowledgments back to the channel's reply
/// endpoint. Without a token it only logs, which keeps local development
/// working without channel credentials.
struct ChannelReplySender {
    client: reqwest::Client,
    endpoint: String,
    access_token: Option<String>,
}

impl ChannelReplySender {
    fn from_env() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: env::var("TIPLINE_REPLY_ENDPOINT")
                .unwrap_or_else(|_| "https://api.line.me/v2/bot/message/reply".to_string()),
            access_token: env::var("TIPLINE_CHANNEL_TOKEN").ok(),
        }
    }
}

#[async_trait]
impl ReplySender for ChannelReplySender {
    async fn reply(&self, reply_token: &str, messages: &[String]) -> Result<(), CollaboratorError> {
        let Some(token) = &self.access_token else {
            info!("No channel token configured, reply suppressed: {:?}", messages);
            return Ok(());
        };

        let body = json!({
            "replyToken": reply_token,
            "messages": messages
                .iter()
                .map(|text| json!({"type": "text", "text": text}))
                .collect::<Vec<_>>(),
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| CollaboratorError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CollaboratorError::InvalidResponse(format!(
                "reply endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Verify the channel's HMAC-SHA256 signature over the raw request body.
fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = BASE64.decode(signature) else {
        return false;
    };
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

async fn health() -> &'static str {
    "ok"
}

async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Some(secret) = &state.channel_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !verify_signature(secret, &body, signature) {
            warn!("Rejected webhook delivery with bad signature");
            return (StatusCode::UNAUTHORIZED, "invalid signature").into_response();
        }
    }

    let Ok(body) = std::str::from_utf8(&body) else {
        return (StatusCode::BAD_REQUEST, "body is not utf-8").into_response();
    };

    let results = match state.processor.process_payload(body).await {
        Ok(results) => results,
        Err(e) => {
            warn!("Unparsable webhook payload: {}", e);
            return (StatusCode::BAD_REQUEST, "invalid payload").into_response();
        }
    };

    let failed = results
        .iter()
        .filter(|r| matches!(r, ProcessResult::Error(_)))
        .count();
    if failed > 0 {
        // Persistence failed for at least one event; report the delivery
        // as failed so the platform can redeliver.
        error!("{} of {} events failed processing", failed, results.len());
        return (StatusCode::INTERNAL_SERVER_ERROR, "processing failed").into_response();
    }

    Json(json!({ "processed": results.len() })).into_response()
}

fn pipeline_config_from_env() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    if let Ok(prefix) = env::var("TIPLINE_CASE_PREFIX") {
        config.case_number_prefix = prefix;
    }
    if let Some(min) = env::var("TIPLINE_MIN_MESSAGES")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        config.policy = MaterializationPolicy { min_messages: min };
    }
    if let Some(secs) = env::var("TIPLINE_SESSION_TTL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        config.session_ttl = Duration::from_secs(secs);
    }
    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let db_url =
        env::var("TIPLINE_DB_URL").unwrap_or_else(|_| "sqlite:tipline.db?mode=rwc".to_string());
    let db = Database::connect(&db_url).await?;
    db.migrate().await?;

    let channel_secret = env::var("TIPLINE_CHANNEL_SECRET").ok();
    if channel_secret.is_none() {
        warn!("TIPLINE_CHANNEL_SECRET not set, webhook signature verification disabled");
    }

    let pipeline = Arc::new(Pipeline::new(db, pipeline_config_from_env()));
    let processor = Arc::new(EventProcessor::with_defaults(
        pipeline.clone(),
        ChannelReplySender::from_env(),
    ));

    // Background TTL pruning for idle sessions.
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            pipeline.prune_idle_sessions().await;
        }
    });

    let state = AppState {
        processor,
        channel_secret,
    };
    let app = Router::new()
        .route("/health", get(health))
        .route("/webhook", post(webhook))
        .with_state(state);

    let addr: SocketAddr = env::var("TIPLINE_BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        .parse()?;
    info!("Tipline gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to listen for Ctrl+C");
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
