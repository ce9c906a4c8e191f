use anyhow::Result;
use axum::{extract::{Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use lexvar_core::{Comparison, Error as IndexError, NormalizerConfig, VariantCatalog, VariantStats};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub variant: String,
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}

#[derive(Deserialize)]
pub struct SearchAllParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub variant: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub score: f64,
}

#[derive(Serialize)]
pub struct VariantInfo {
    pub name: String,
    pub config: NormalizerConfig,
    pub stats: VariantStats,
    pub skipped: usize,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<RwLock<VariantCatalog>>,
    pub index_dir: PathBuf,
    pub stopwords: Option<PathBuf>,
    pub admin_token: Option<String>,
}

/// Builds the router with the admin token taken from `ADMIN_TOKEN`.
pub fn build_app(index_dir: String, stopwords: Option<PathBuf>) -> Result<Router> {
    build_app_with_token(index_dir, stopwords, std::env::var("ADMIN_TOKEN").ok())
}

/// Without a token, `/admin/reload` rejects every request.
pub fn build_app_with_token(index_dir: String, stopwords: Option<PathBuf>, admin_token: Option<String>) -> Result<Router> {
    // Load the catalog at startup
    let catalog = VariantCatalog::open(&index_dir, stopwords.as_deref())?;
    let app_state = AppState {
        catalog: Arc::new(RwLock::new(catalog)),
        index_dir: PathBuf::from(&index_dir),
        stopwords,
        admin_token,
    };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/variants", get(variants_handler))
        .route("/compare", get(compare_handler))
        .route("/search", get(search_handler))
        .route("/search/all", get(search_all_handler))
        .route("/admin/reload", post(reload_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

fn api_error(err: IndexError) -> ApiError {
    let status = match &err {
        IndexError::UnknownVariant(_) => StatusCode::NOT_FOUND,
        IndexError::EmptyCatalog | IndexError::IndexUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": err.to_string() })))
}

fn clamp_k(k: usize) -> usize { k.clamp(1, 100) }

pub async fn variants_handler(State(state): State<AppState>) -> Json<Vec<VariantInfo>> {
    let catalog = state.catalog.read();
    let infos = catalog
        .variants()
        .iter()
        .map(|v| VariantInfo {
            name: v.name().to_string(),
            config: *v.config(),
            stats: v.stats().clone(),
            skipped: v.skipped().len(),
        })
        .collect();
    Json(infos)
}

pub async fn compare_handler(State(state): State<AppState>) -> Json<Comparison> {
    Json(state.catalog.read().compare_variants())
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let ranked = state.catalog.read().search(&params.variant, &params.q, usize::MAX).map_err(api_error)?;
    let total_hits = ranked.len();
    let results = ranked
        .into_iter()
        .take(clamp_k(params.k))
        .map(|(doc_id, score)| SearchHit { doc_id, score })
        .collect();
    let elapsed = start.elapsed();
    tracing::debug!(variant = %params.variant, total_hits, took_ms = elapsed.as_millis() as u64, "search");
    Ok(Json(SearchResponse { query: params.q, variant: params.variant, took_s: elapsed.as_secs_f64(), total_hits, results }))
}

pub async fn search_all_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchAllParams>,
) -> Result<Json<Vec<SearchResponse>>, ApiError> {
    let catalog = state.catalog.read();
    let mut responses = Vec::new();
    for name in catalog.variant_names() {
        let start = std::time::Instant::now();
        let ranked = catalog.search(name, &params.q, usize::MAX).map_err(api_error)?;
        let total_hits = ranked.len();
        let results = ranked
            .into_iter()
            .take(clamp_k(params.k))
            .map(|(doc_id, score)| SearchHit { doc_id, score })
            .collect();
        responses.push(SearchResponse {
            query: params.q.clone(),
            variant: name.to_string(),
            took_s: start.elapsed().as_secs_f64(),
            total_hits,
            results,
        });
    }
    if responses.is_empty() {
        return Err(api_error(IndexError::EmptyCatalog));
    }
    Ok(Json(responses))
}

// --- Admin endpoints ---
/// Re-opens the catalog directory and swaps it in. On failure the loaded catalog keeps serving.
async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let catalog = VariantCatalog::open(&state.index_dir, state.stopwords.as_deref()).map_err(api_error)?;
    let variants = catalog.variant_names().len();
    *state.catalog.write() = catalog;
    tracing::info!(dir = %state.index_dir.display(), variants, "reloaded catalog");
    Ok(Json(serde_json::json!({ "reloaded": variants })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, Json(serde_json::json!({ "error": "ADMIN_TOKEN not set" })))),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, Json(serde_json::json!({ "error": "invalid admin token" }))))
    }
}
