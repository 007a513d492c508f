//! API Handlers
//!
//! HTTP request handlers for each cache administration endpoint.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use tracing::info;

use crate::cache::{EntryMetadata, KnowledgeCache, StatsSnapshot, WarmEntry};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, DeleteResponse, GetResponse, HealthResponse, SetRequest, SetResponse,
    WarmRequest, WarmResponse,
};

/// Application state shared across all handlers.
///
/// The cache handle is internally synchronised, so the state is cloned
/// into each handler as-is.
#[derive(Clone, Debug)]
pub struct AppState {
    pub cache: KnowledgeCache,
}

impl AppState {
    /// Creates a new AppState around an existing cache.
    pub fn new(cache: KnowledgeCache) -> Self {
        Self { cache }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(KnowledgeCache::new(&config.cache))
    }
}

/// Handler for PUT /set
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state.cache.set(&req.key, &req.value, req.ttl())?;
    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
///
/// Counts a hit or a miss like any other read.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.cache.get::<Value>(&key)? {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for GET /entries/:key
///
/// Returns entry metadata without touching recency or stats.
pub async fn entry_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<EntryMetadata>> {
    state
        .cache
        .peek(&key)
        .map(Json)
        .ok_or(CacheError::NotFound(key))
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if state.cache.invalidate(&key) {
        Ok(Json(DeleteResponse::new(key)))
    } else {
        Err(CacheError::NotFound(key))
    }
}

/// Handler for POST /clear
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    Json(ClearResponse::new(state.cache.clear()))
}

/// Handler for POST /warm
pub async fn warm_handler(
    State(state): State<AppState>,
    Json(req): Json<WarmRequest>,
) -> Result<Json<WarmResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let supplied = req.entries.len();
    let seed = req.entries.into_iter().map(WarmEntry::<Value>::from);
    let retained = state.cache.warm(seed)?;
    info!("Warm request: {} supplied, {} retained", supplied, retained);

    Ok(Json(WarmResponse { supplied, retained }))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.cache.stats())
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
