use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::history::{add_favorite, load_collection, Collection};
use crate::model::{ScoredArticle, SourceMode};
use crate::pipeline::Pipeline;

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

/// Trigger surface plus read access to the collections the dashboard consumes.
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    let state = AppState { pipeline };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/run", post(run))
        .route("/latest/{category}", get(latest))
        .route("/history/{category}", get(history))
        .route("/favorites", get(favorites).post(save_favorite))
        .route("/regrade", post(regrade))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

impl From<crate::error::PipelineError> for ApiError {
    fn from(e: crate::error::PipelineError) -> Self {
        tracing::error!(error = %e, "request failed");
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

fn category(raw: &str) -> Result<SourceMode, ApiError> {
    SourceMode::from_collection_suffix(raw).ok_or_else(|| {
        ApiError(
            StatusCode::NOT_FOUND,
            format!("unknown category '{raw}' (expected news or papers)"),
        )
    })
}

async fn run(State(state): State<AppState>) -> Result<String, ApiError> {
    let summary = state.pipeline.run_once().await?;
    Ok(summary.to_string())
}

async fn latest(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<Vec<ScoredArticle>>, ApiError> {
    let key = Collection::Latest(category(&raw)?).key();
    Ok(Json(load_collection(state.pipeline.store().as_ref(), &key).await?))
}

async fn history(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<Vec<ScoredArticle>>, ApiError> {
    let key = Collection::History(category(&raw)?).key();
    Ok(Json(load_collection(state.pipeline.store().as_ref(), &key).await?))
}

async fn favorites(State(state): State<AppState>) -> Result<Json<Vec<ScoredArticle>>, ApiError> {
    let key = Collection::Favorites.key();
    Ok(Json(load_collection(state.pipeline.store().as_ref(), &key).await?))
}

#[derive(serde::Serialize)]
struct FavoriteOut {
    added: bool,
}

async fn save_favorite(
    State(state): State<AppState>,
    Json(article): Json<ScoredArticle>,
) -> Result<Json<FavoriteOut>, ApiError> {
    if article.item.title.trim().is_empty() || article.link().trim().is_empty() {
        return Err(ApiError(
            StatusCode::UNPROCESSABLE_ENTITY,
            "title and link are required".into(),
        ));
    }
    let added = add_favorite(state.pipeline.store().as_ref(), article).await?;
    Ok(Json(FavoriteOut { added }))
}

#[derive(serde::Serialize)]
struct RegradeOut {
    regraded: usize,
}

async fn regrade(State(state): State<AppState>) -> Result<Json<RegradeOut>, ApiError> {
    let regraded = state.pipeline.regrade_favorites().await?;
    Ok(Json(RegradeOut { regraded }))
}
