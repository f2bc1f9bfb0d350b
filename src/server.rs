use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;
use crate::error::RequestError;
use crate::model::{Model, Scored};
use crate::types::{PredictionOut, PredictionRequest};

// ---------- Server state ----------

/// Built once at startup and shared read-only by every request.
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<Model>,
    pub log_predictions: bool,
}

impl AppState {
    pub fn new(model: Model, log_predictions: bool) -> Self {
        Self {
            model: Arc::new(model),
            log_predictions,
        }
    }
}

// ---------- Errors ----------

#[derive(Debug)]
pub enum ApiError {
    Request(RequestError),
    Internal(anyhow::Error),
}

impl From<RequestError> for ApiError {
    fn from(e: RequestError) -> Self {
        ApiError::Request(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Internal(anyhow::Error::new(e).context("failed to read JSON request body"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::Request(e) if e.is_client_error() => {
                return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })))
                    .into_response();
            }
            ApiError::Request(e) => anyhow::Error::new(e),
            ApiError::Internal(e) => e,
        };

        let trace = format!("{err:?}");
        tracing::error!(error = %err, trace = %trace, "prediction failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": err.to_string(), "trace": trace })),
        )
            .into_response()
    }
}

// ---------- Handlers ----------

async fn home(State(state): State<AppState>) -> Json<Value> {
    let accuracy = state.model.info().accuracy;
    Json(json!({
        "message": "Flight Delay Prediction API",
        "accuracy": format!("{:.2}%", accuracy * 100.0),
        "endpoints": {
            "/predict": "POST - Make a prediction",
            "/info": "GET - Get model information",
        },
    }))
}

async fn info(State(state): State<AppState>) -> Json<Value> {
    let info = state.model.info();
    Json(json!({
        "accuracy": info.accuracy,
        "airlines": info.airlines,
        "origins": info.origins,
        "destinations": info.destinations,
        "total_features": state.model.schema().len(),
    }))
}

fn log_prediction(state: &AppState, req: &PredictionRequest, scored: &Scored) {
    let vec = &scored.features.values;
    let nz = vec.iter().filter(|x| **x != 0.0).count();
    let mut sample = vec![];
    for (i, name) in state.model.schema().columns().iter().take(6).enumerate() {
        sample.push(format!("{}={:.3}", name, vec[i]));
    }
    tracing::info!(
        "predict airline={:?} route={}->{} time={}->{} in_dim={} nonzero={} sample=[{}] class={} p_ontime={:.4} p_delayed={:.4}",
        req.airline,
        req.origin_airport,
        req.dest_airport,
        req.departure_time,
        req.arrival_time,
        vec.len(),
        nz,
        sample.join(", "),
        scored.class,
        scored.proba[0],
        scored.proba[1],
    );
}

async fn predict(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictionOut>, ApiError> {
    // A body that is not JSON is answered like any other failure, as JSON.
    let Json(body) = body?;
    // All presence and range checks happen before any vector is built.
    let req = PredictionRequest::from_json(&body)?;

    let scored = state
        .model
        .score(&req.row())
        .context("failed to score flight")?;

    if !scored.features.dropped.is_empty() {
        tracing::warn!(
            unseen = ?scored.features.dropped,
            "categorical values not seen in training; treated as absent"
        );
    }
    if state.log_predictions {
        log_prediction(&state, &req, &scored);
    }

    Ok(Json(scored.output()))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/info", get(info))
        .route("/predict", post(predict))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

pub async fn serve(cfg: ServerConfig) -> anyhow::Result<()> {
    let model = Model::load(&cfg.model_path)?;
    let info = model.info();
    tracing::info!(
        path = %cfg.model_path.display(),
        accuracy = info.accuracy,
        features = model.schema().len(),
        airlines = info.airlines.len(),
        origins = info.origins.len(),
        destinations = info.destinations.len(),
        "loaded model"
    );

    let app = router(AppState::new(model, cfg.log_predictions));

    let addr = cfg.addr()?;
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
