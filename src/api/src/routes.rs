//! API route handlers.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::ingest::{
    load_source, plan_step, run_pipeline, LoadSummary, PipelineOptions, RowSource,
};
use crate::models::{Driver, EntityKind, Race, RaceResult};
use crate::storage::Repository;
use crate::types::{
    ErrorResponse, HealthResponse, ImportAcceptedResponse, RacesQuery, StatsResponse, TableCount,
};

/// Largest CSV body accepted by the upload endpoint
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Application state shared across handlers.
pub struct AppState {
    pub repo: Mutex<Repository>,
    pub config: AppConfig,
}

/// Error type for API handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.status.to_string(),
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/stats", get(stats))
        .route("/api/batch/import-all", post(import_all))
        .route(
            "/api/batch/upload/:entity",
            post(upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/races", get(races))
        .route("/api/races/:race_id/results", get(race_results))
        .route("/api/drivers/by-ref/:driver_ref", get(driver_by_ref))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn with_repo<T>(
    state: &AppState,
    f: impl FnOnce(&Repository) -> anyhow::Result<T>,
) -> Result<T, ApiError> {
    let repo = state
        .repo
        .lock()
        .map_err(|_| ApiError::internal("Repository lock poisoned"))?;
    f(&repo).map_err(|e| ApiError::internal(format!("{:#}", e)))
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Row counts per table.
pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>, ApiError> {
    let (counts, violations) = with_repo(&state, |repo| {
        Ok((repo.table_counts()?, repo.foreign_key_violations()?))
    })?;

    Ok(Json(StatsResponse {
        tables: counts
            .into_iter()
            .map(|(kind, rows)| TableCount {
                table: kind.table().to_string(),
                rows,
            })
            .collect(),
        foreign_key_violations: violations,
    }))
}

/// Start a full dataset load in the background.
pub async fn import_all(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_path = state.config.database.path.clone();
    let opts = PipelineOptions {
        data_dir: state.config.loader.data_dir.clone(),
        force: false,
        load: state.config.loader.load_options(),
    };

    tokio::task::spawn_blocking(move || match Repository::new(&db_path) {
        Ok(repo) => {
            let report = run_pipeline(&repo, &opts);
            tracing::info!(
                "Background import finished: {} new rows, {} row errors sampled",
                report.total_loaded(),
                report.errors(usize::MAX).len()
            );
        }
        Err(e) => tracing::error!("Background import could not open database: {:#}", e),
    });

    (
        StatusCode::ACCEPTED,
        Json(ImportAcceptedResponse {
            status: "processing".to_string(),
            message: "Full import started in background".to_string(),
        }),
    )
}

/// Load one uploaded CSV file synchronously.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Path(entity): Path<String>,
    body: Bytes,
) -> Result<Json<LoadSummary>, ApiError> {
    let kind: EntityKind = entity
        .parse()
        .map_err(|e: String| ApiError::bad_request(e))?;
    let step = plan_step(kind)
        .ok_or_else(|| ApiError::bad_request(format!("entity {} cannot be uploaded", kind)))?;
    let opts = state.config.loader.load_options();

    let summary = tokio::task::spawn_blocking(move || {
        let mut source = RowSource::from_reader(Cursor::new(body))
            .map_err(|e| ApiError::bad_request(format!("{:#}", e)))?;
        with_repo(&state, |repo| {
            repo.mark_in_progress(kind)?;
            load_source(repo, step, &mut source, &opts)
        })
    })
    .await
    .map_err(|e| ApiError::internal(format!("Load task failed: {}", e)))??;

    Ok(Json(summary))
}

/// Races of one season, ordered by round.
pub async fn races(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RacesQuery>,
) -> Result<Json<Vec<Race>>, ApiError> {
    let races = with_repo(&state, |repo| repo.races_by_year(query.year))?;
    Ok(Json(races))
}

/// Results of one race in finishing order.
pub async fn race_results(
    State(state): State<Arc<AppState>>,
    Path(race_id): Path<i64>,
) -> Result<Json<Vec<RaceResult>>, ApiError> {
    let results = with_repo(&state, |repo| repo.race_results(race_id))?;
    Ok(Json(results))
}

/// Driver lookup by reference.
pub async fn driver_by_ref(
    State(state): State<Arc<AppState>>,
    Path(driver_ref): Path<String>,
) -> Result<Json<Driver>, ApiError> {
    with_repo(&state, |repo| repo.driver_by_ref(&driver_ref))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Driver not found: {}", driver_ref)))
}
