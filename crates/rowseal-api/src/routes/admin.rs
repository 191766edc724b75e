//! # Database Administration API
//!
//! Introspection and key-roll endpoints for operators rotating keys or
//! canonical forms.
//!
//! - `GET  /admin/database/entities`                        — registered types
//! - `GET  /admin/database/entities/{entity}/signatures`    — rows per form and key
//! - `GET  /admin/database/entities/{entity}/tuples`        — row keys, `?form=&key=`
//! - `GET  /admin/database/entities/{entity}/tuples/{pk}`   — signature and key detail
//! - `POST /admin/database/entities/{entity}/roll`          — re-sign and re-seal rows
//!
//! Composite primary keys contain `/` and must be percent-encoded in paths.
//! A `/` or `%` inside one column value is already encoded in the rendered
//! key (`%2F`, `%25`) and is encoded again in the path.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use rowseal_core::{FormId, KeyTimestamp, PrimaryKey};
use rowseal_mapper::{BatchReport, EntitySummary, SignatureSummary, TupleFilter, TupleInfo};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

/// Upper bound on keys per roll request.
const MAX_ROLL_BATCH: usize = 1000;

/// Registered entity types.
#[derive(Debug, Serialize, Deserialize)]
pub struct EntityListResponse {
    pub entities: Vec<EntitySummary>,
    pub total: usize,
}

/// Query string of the tuple listing.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TupleListQuery {
    /// Hex form id.
    #[serde(default)]
    pub form: Option<String>,
    /// Signing key timestamp.
    #[serde(default)]
    pub key: Option<i64>,
}

/// Row keys of one entity type.
#[derive(Debug, Serialize, Deserialize)]
pub struct TupleListResponse {
    pub entity: String,
    pub keys: Vec<PrimaryKey>,
    pub total: usize,
}

/// Body of a roll request.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RollRequest {
    /// Keys to roll, in order.
    pub primary_keys: Vec<String>,
    /// Skip keys with no stored row instead of failing.
    #[serde(default)]
    pub ignore_missing: bool,
}

/// Build the admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/database/entities", get(list_entities))
        .route("/admin/database/entities/{entity}/signatures", get(signature_summary))
        .route("/admin/database/entities/{entity}/tuples", get(list_tuples))
        .route("/admin/database/entities/{entity}/tuples/{pk}", get(tuple_info))
        .route("/admin/database/entities/{entity}/roll", post(roll))
}

/// GET /admin/database/entities
async fn list_entities(State(state): State<AppState>) -> Json<EntityListResponse> {
    let entities = state.mapper.list_entities();
    Json(EntityListResponse {
        total: entities.len(),
        entities,
    })
}

/// GET /admin/database/entities/{entity}/signatures
async fn signature_summary(
    State(state): State<AppState>,
    Path(entity): Path<String>,
) -> Result<Json<SignatureSummary>, AppError> {
    let mut exec = state.db.acquire().await?;
    Ok(Json(state.mapper.signature_summary(&mut *exec, &entity).await?))
}

/// GET /admin/database/entities/{entity}/tuples?form=&key=
async fn list_tuples(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Query(query): Query<TupleListQuery>,
) -> Result<Json<TupleListResponse>, AppError> {
    let form = query
        .form
        .map(FormId::from_hex)
        .transpose()
        .map_err(|e| AppError::Validation(format!("form: {e}")))?;
    let filter = TupleFilter {
        form,
        key: query.key.map(KeyTimestamp),
    };
    let mut exec = state.db.acquire().await?;
    let keys = state.mapper.list_tuple_keys(&mut *exec, &entity, &filter).await?;
    Ok(Json(TupleListResponse {
        entity,
        total: keys.len(),
        keys,
    }))
}

/// GET /admin/database/entities/{entity}/tuples/{pk}
async fn tuple_info(
    State(state): State<AppState>,
    Path((entity, pk)): Path<(String, String)>,
) -> Result<Json<TupleInfo>, AppError> {
    let mut exec = state.db.acquire().await?;
    let info = state
        .mapper
        .tuple_info(&mut *exec, &entity, &PrimaryKey::from(pk))
        .await?;
    Ok(Json(info))
}

/// POST /admin/database/entities/{entity}/roll
async fn roll(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Json(req): Json<RollRequest>,
) -> Result<Json<BatchReport>, AppError> {
    if req.primary_keys.is_empty() {
        return Err(AppError::Validation("primary_keys must not be empty".into()));
    }
    if req.primary_keys.len() > MAX_ROLL_BATCH {
        return Err(AppError::Validation(format!(
            "at most {MAX_ROLL_BATCH} primary_keys per request"
        )));
    }
    let keys: Vec<PrimaryKey> = req.primary_keys.into_iter().map(PrimaryKey::from).collect();
    let report = state
        .mapper
        .roll_batch(state.db.as_ref(), &entity, &keys, req.ignore_missing)
        .await?;
    Ok(Json(report))
}
