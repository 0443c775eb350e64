//! JSON API for the pricing adjustment engine.
//!
//! Endpoints (all under `/api/v1`):
//! - `GET  /index-entries`                — list index observations
//! - `POST /index-entries`                — record one entry or a batch
//! - `GET  /timeline`                     — derive or validate an adjustment timeline
//! - `POST /pricing/calculate`            — evaluate a formula over three prices
//! - `POST /adjustments/preview`          — read-only impact projection
//! - `POST /adjustments`                  — create a draft adjustment
//! - `GET  /adjustments`                  — list adjustments
//! - `GET  /adjustments/{id}`             — fetch one adjustment
//! - `POST /adjustments/{id}/apply`       — commit a draft to the catalog
//! - `POST /adjustments/{id}/cancel`      — abandon a draft

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use ftzadjust_core::domain::adjustment::{
    AdjustmentDraft, AdjustmentId, AdjustmentStatus, ApplyOutcome, PricingAdjustment,
};
use ftzadjust_core::domain::material::{Material, MaterialIndexEntry, MonthKey, NewIndexEntry};
use ftzadjust_core::errors::{EngineError, ValidationError};
use ftzadjust_core::pricing::formula::FormulaRegistry;
use ftzadjust_core::pricing::impact::{compute_impact, ImpactReport};
use ftzadjust_core::pricing::timeline::{compute_timeline, Timeline, TimelineOverride};
use ftzadjust_db::repositories::{
    AdjustmentRepository, MaterialIndexRepository, PartsCatalog, SqlAdjustmentRepository,
    SqlMaterialIndexRepository, SqlPartsCatalog,
};
use ftzadjust_db::{AdjustmentLifecycle, DbPool};

#[derive(Clone)]
pub struct ApiState {
    db_pool: DbPool,
    formulas: Arc<FormulaRegistry>,
    lifecycle: Arc<AdjustmentLifecycle>,
}

pub fn router(db_pool: DbPool) -> Router {
    router_with_registry(db_pool, Arc::new(FormulaRegistry::with_builtins()))
}

pub fn router_with_registry(db_pool: DbPool, formulas: Arc<FormulaRegistry>) -> Router {
    let lifecycle = Arc::new(AdjustmentLifecycle::new(db_pool.clone(), Arc::clone(&formulas)));

    Router::new()
        .route("/api/v1/index-entries", get(list_index_entries).post(record_index_entries))
        .route("/api/v1/timeline", get(get_timeline))
        .route("/api/v1/pricing/calculate", post(calculate_price))
        .route("/api/v1/adjustments/preview", post(preview_adjustment))
        .route("/api/v1/adjustments", get(list_adjustments).post(create_adjustment))
        .route("/api/v1/adjustments/{id}", get(get_adjustment))
        .route("/api/v1/adjustments/{id}/apply", post(apply_adjustment))
        .route("/api/v1/adjustments/{id}/cancel", post(cancel_adjustment))
        .with_state(ApiState { db_pool, formulas, lifecycle })
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub retriable: bool,
}

pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        Self(error)
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        Self(EngineError::Validation(error))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::ApplyFailed { .. } | EngineError::Persistence(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        let body = ApiErrorBody { error: self.0.to_string(), retriable: self.0.is_retriable() };
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Index entries
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
pub struct IndexEntryQuery {
    pub material: Option<Material>,
    pub from: Option<MonthKey>,
    pub to: Option<MonthKey>,
}

async fn list_index_entries(
    State(state): State<ApiState>,
    Query(query): Query<IndexEntryQuery>,
) -> Result<Json<Vec<MaterialIndexEntry>>, ApiError> {
    let repo = SqlMaterialIndexRepository::new(state.db_pool.clone());
    let entries = repo
        .list(query.material, query.from, query.to)
        .await
        .map_err(EngineError::from)?;
    Ok(Json(entries))
}

/// Accepts a single entry object or an array of entries.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

async fn record_index_entries(
    State(state): State<ApiState>,
    Json(payload): Json<OneOrMany<NewIndexEntry>>,
) -> Result<(StatusCode, Json<Vec<MaterialIndexEntry>>), ApiError> {
    let entries = match payload {
        OneOrMany::One(entry) => vec![entry],
        OneOrMany::Many(entries) => entries,
    };

    for entry in &entries {
        entry.validate()?;
    }

    let repo = SqlMaterialIndexRepository::new(state.db_pool.clone());
    let persisted = repo.insert_batch(entries).await.map_err(EngineError::from)?;

    info!(
        event_name = "pricing.index.recorded",
        count = persisted.len(),
        "material index entries recorded"
    );
    Ok((StatusCode::CREATED, Json(persisted)))
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
pub struct TimelineQuery {
    pub reference_date: Option<NaiveDate>,
    /// Comma-separated `YYYY-MM` list; requires the other override fields.
    pub data_months: Option<String>,
    pub communication_month: Option<MonthKey>,
    pub effective_month: Option<MonthKey>,
}

fn parse_timeline_override(query: &TimelineQuery) -> Result<Option<TimelineOverride>, ApiError> {
    let any_override = query.data_months.is_some()
        || query.communication_month.is_some()
        || query.effective_month.is_some();
    if !any_override {
        return Ok(None);
    }

    let (Some(raw_months), Some(communication_month), Some(effective_month)) =
        (&query.data_months, query.communication_month, query.effective_month)
    else {
        return Err(ValidationError::InvalidTimeline {
            reason: "timeline override requires data_months, communication_month, and \
                     effective_month together"
                .to_string(),
        }
        .into());
    };

    let months = raw_months
        .split(',')
        .map(|raw| {
            raw.trim().parse::<MonthKey>().map_err(|error| ValidationError::InvalidTimeline {
                reason: format!("data month `{raw}`: {error}"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if months.len() != 3 {
        return Err(ValidationError::InvalidTimeline {
            reason: format!("expected 3 data months, got {}", months.len()),
        }
        .into());
    }

    Ok(Some(TimelineOverride {
        data_months: [months[0], months[1], months[2]],
        communication_month,
        effective_month,
    }))
}

async fn get_timeline(Query(query): Query<TimelineQuery>) -> Result<Json<Timeline>, ApiError> {
    let reference_date = query.reference_date.unwrap_or_else(|| Utc::now().date_naive());
    let timeline_override = parse_timeline_override(&query)?;
    let timeline = compute_timeline(reference_date, timeline_override)?;
    Ok(Json(timeline))
}

// ---------------------------------------------------------------------------
// Formula evaluation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CalculateRequest {
    pub formula: String,
    pub prices: Vec<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct CalculateResponse {
    pub formula: String,
    pub result: Decimal,
    pub breakdown: String,
}

async fn calculate_price(
    State(state): State<ApiState>,
    Json(request): Json<CalculateRequest>,
) -> Result<Json<CalculateResponse>, ApiError> {
    let output = state.formulas.calculate(&request.formula, &request.prices)?;
    Ok(Json(CalculateResponse {
        formula: request.formula,
        result: output.result,
        breakdown: output.breakdown,
    }))
}

// ---------------------------------------------------------------------------
// Adjustments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub material: Material,
    pub old_average_price: Decimal,
    pub new_average_price: Decimal,
}

async fn preview_adjustment(
    State(state): State<ApiState>,
    Json(request): Json<PreviewRequest>,
) -> Result<Json<ImpactReport>, ApiError> {
    for (field, value) in [
        ("old_average_price", request.old_average_price),
        ("new_average_price", request.new_average_price),
    ] {
        if value <= Decimal::ZERO {
            return Err(ValidationError::InvalidAdjustment {
                field: field.to_string(),
                reason: format!("must be positive, got {value}"),
            }
            .into());
        }
    }

    let catalog = SqlPartsCatalog::new(state.db_pool.clone());
    let parts = catalog.parts_by_material(request.material).await.map_err(EngineError::from)?;
    let report = compute_impact(&parts, request.old_average_price, request.new_average_price);
    Ok(Json(report))
}

async fn create_adjustment(
    State(state): State<ApiState>,
    Json(draft): Json<AdjustmentDraft>,
) -> Result<(StatusCode, Json<PricingAdjustment>), ApiError> {
    let created = state.lifecycle.create(draft).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize, Default)]
pub struct AdjustmentListQuery {
    pub status: Option<AdjustmentStatus>,
    pub material: Option<Material>,
}

async fn list_adjustments(
    State(state): State<ApiState>,
    Query(query): Query<AdjustmentListQuery>,
) -> Result<Json<Vec<PricingAdjustment>>, ApiError> {
    let repo = SqlAdjustmentRepository::new(state.db_pool.clone());
    let adjustments =
        repo.list(query.status, query.material).await.map_err(EngineError::from)?;
    Ok(Json(adjustments))
}

async fn get_adjustment(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<PricingAdjustment>, ApiError> {
    let repo = SqlAdjustmentRepository::new(state.db_pool.clone());
    let adjustment = repo
        .find_by_id(&AdjustmentId(id.clone()))
        .await
        .map_err(EngineError::from)?
        .ok_or(EngineError::NotFound { adjustment_id: id })?;
    Ok(Json(adjustment))
}

async fn apply_adjustment(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<ApplyOutcome>, ApiError> {
    let outcome = state.lifecycle.apply(&AdjustmentId(id)).await?;
    Ok(Json(outcome))
}

async fn cancel_adjustment(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<PricingAdjustment>, ApiError> {
    let cancelled = state.lifecycle.cancel(&AdjustmentId(id)).await?;
    Ok(Json(cancelled))
}
