use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::rag::scope::{AUTO_LABEL, UNSCOPED_LABEL};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ScopeInfo {
    pub id: String,
    pub description: String,
    /// Passages indexed under this scope.
    pub passages: usize,
}

#[derive(Debug, Serialize)]
pub struct ScopesResponse {
    /// Values accepted as `doc_filter` besides the scope ids.
    pub special: Vec<&'static str>,
    pub scopes: Vec<ScopeInfo>,
    /// Indexed sources with no catalog entry. Reachable only by explicit scope.
    pub uncatalogued: Vec<String>,
}

/// GET /api/scopes - Catalog scopes with their indexed passage counts.
pub async fn list_scopes(State(state): State<AppState>) -> Json<ScopesResponse> {
    let mut counts = state.index.store().sources();
    let catalog = state.pipeline.catalog();

    let scopes = catalog
        .scopes()
        .iter()
        .map(|p| ScopeInfo {
            id: p.id.clone(),
            description: p.description.clone(),
            passages: counts.remove(&p.id).unwrap_or(0),
        })
        .collect();

    Json(ScopesResponse {
        special: vec![AUTO_LABEL, UNSCOPED_LABEL],
        scopes,
        uncatalogued: counts.into_keys().collect(),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub passages: usize,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        passages: state.index.store().len(),
    })
}
