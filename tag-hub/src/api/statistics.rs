use super::{ApiResult, AppState, AuthContext};
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tag_hub_core::statistics::StatisticResult;

#[derive(Serialize)]
pub struct StatisticSummary {
    pub slug: &'static str,
    pub label: &'static str,
    pub url: String,
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/statistics", get(list_statistics))
        .route("/statistics/{slug}", get(execute_statistic))
}

async fn list_statistics(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<StatisticSummary>>> {
    let hub = state.hub.read().await;
    let summaries = hub
        .statistics(&auth.principal)?
        .into_iter()
        .map(|(slug, label)| StatisticSummary {
            slug,
            label,
            url: format!("/statistics/{slug}"),
        })
        .collect();
    Ok(Json(summaries))
}

async fn execute_statistic(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(slug): Path<String>,
) -> ApiResult<Json<StatisticResult>> {
    let hub = state.hub.read().await;
    Ok(Json(hub.execute_statistic(&auth.principal, &slug)?))
}
