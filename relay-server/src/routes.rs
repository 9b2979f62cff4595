//! HTTP routes
//!
//! | Method | Path             | Description                           |
//! |--------|------------------|---------------------------------------|
//! | GET    | `/ping`          | Liveness probe                        |
//! | GET    | `/health`        | Health probe                          |
//! | GET    | `/state`         | All current state records             |
//! | GET    | `/state/{key}`   | One state record                      |
//! | POST   | `/state`         | Apply `{"key": .., "value": ..}`      |
//! | GET    | `/connections`   | Ids of connected WebSocket clients    |
//! | GET    | `/ws`            | WebSocket upgrade                     |

use std::convert::Infallible;
use std::sync::Arc;

use relay_hub::{ConnectionIdGenerator, HubHandle, RelayError, StateKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::config::ServerConfig;
use crate::ws;

/// Largest accepted request body
const MAX_BODY_BYTES: u64 = 16 * 1024;

/// Shared state handed to every route
#[derive(Debug, Clone)]
pub struct RelayContext {
    pub(crate) hub: HubHandle,
    pub(crate) ids: Arc<ConnectionIdGenerator>,
    pub(crate) client_buffer_size: usize,
}

impl RelayContext {
    pub fn new(hub: HubHandle, client_buffer_size: usize) -> Self {
        Self {
            hub,
            ids: Arc::new(ConnectionIdGenerator::new()),
            client_buffer_size,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SetStateRequest {
    key: String,
    value: Value,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Failures of API handlers
#[derive(Debug)]
enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unavailable,
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::NotFound(message)
            | ApiError::BadRequest(message)
            | ApiError::Internal(message) => message.clone(),
            ApiError::Unavailable => "Relay hub is not running".to_string(),
        }
    }
}

impl warp::reject::Reject for ApiError {}

impl From<RelayError> for ApiError {
    fn from(error: RelayError) -> Self {
        match error {
            RelayError::HubClosed => ApiError::Unavailable,
            RelayError::Decode(e) => ApiError::BadRequest(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// All routes with CORS applied and rejections rendered as JSON
pub fn routes(
    ctx: RelayContext,
    config: &ServerConfig,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let api = ping()
        .or(health())
        .or(list_state(ctx.clone()))
        .or(get_state(ctx.clone()))
        .or(post_state(ctx.clone()))
        .or(connections(ctx.clone()))
        .or(websocket(ctx));

    api.with(cors(config)).recover(handle_rejection)
}

fn cors(config: &ServerConfig) -> warp::filters::cors::Builder {
    let builder = warp::cors()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["content-type", "authorization", "accept"]);

    if config.allows_any_origin() {
        builder.allow_any_origin()
    } else {
        builder
            .allow_credentials(true)
            .allow_origins(config.allowed_origins.iter().map(String::as_str))
    }
}

fn with_ctx(
    ctx: RelayContext,
) -> impl Filter<Extract = (RelayContext,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

fn ping() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("ping")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| warp::reply::json(&serde_json::json!({ "message": "pong" })))
}

fn health() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| warp::reply::json(&serde_json::json!({ "status": "ok" })))
}

fn list_state(
    ctx: RelayContext,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("state")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_ctx(ctx))
        .map(|ctx: RelayContext| warp::reply::json(&ctx.hub.state().snapshot()))
}

fn get_state(
    ctx: RelayContext,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("state" / String)
        .and(warp::get())
        .and(with_ctx(ctx))
        .and_then(|key: String, ctx: RelayContext| async move {
            let record = key
                .parse::<StateKey>()
                .ok()
                .and_then(|parsed| ctx.hub.state().get(&parsed).ok())
                .ok_or_else(|| {
                    warp::reject::custom(ApiError::NotFound(format!("Unknown state key '{key}'")))
                })?;
            Ok::<_, Rejection>(warp::reply::json(&record))
        })
}

fn post_state(
    ctx: RelayContext,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("state")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json::<SetStateRequest>())
        .and(with_ctx(ctx))
        .and_then(|request: SetStateRequest, ctx: RelayContext| async move {
            let record = ctx
                .hub
                .apply_state(request.key, request.value)
                .await
                .map_err(|e| warp::reject::custom(ApiError::from(e)))?;
            Ok::<_, Rejection>(warp::reply::json(&record))
        })
}

fn connections(
    ctx: RelayContext,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("connections")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_ctx(ctx))
        .and_then(|ctx: RelayContext| async move {
            let ids = ctx
                .hub
                .connections()
                .await
                .map_err(|e| warp::reject::custom(ApiError::from(e)))?;
            Ok::<_, Rejection>(warp::reply::json(
                &serde_json::json!({ "connections": ids }),
            ))
        })
}

fn websocket(
    ctx: RelayContext,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .and(with_ctx(ctx))
        .map(|upgrade: warp::ws::Ws, ctx: RelayContext| {
            upgrade.on_upgrade(move |socket| ws::session(socket, ctx))
        })
}

/// Render rejections as `{"error": ...}` with a matching status
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if let Some(e) = err.find::<ApiError>() {
        (e.status(), e.message())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large".to_string())
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Expected application/json".to_string(),
        )
    } else if let Some(e) = err.find::<warp::filters::cors::CorsForbidden>() {
        (StatusCode::FORBIDDEN, e.to_string())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        tracing::warn!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ErrorBody { error: message }),
        code,
    ))
}
