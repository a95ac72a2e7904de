use super::{ApiResult, AppState, AuthContext, Page, PageParams};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tag_hub_core::{Grant, ObjectKind, ObjectRef};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct GrantQuery {
    pub kind: String,
    pub id: Uuid,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

pub(super) fn routes() -> Router<AppState> {
    Router::new().route("/grants", get(list_grants).post(add_grant).delete(revoke_grant))
}

async fn list_grants(
    State(state): State<AppState>,
    auth: AuthContext,
    query: Result<Query<GrantQuery>, QueryRejection>,
) -> ApiResult<Json<Page<Grant>>> {
    let Query(query) = query?;
    let kind: ObjectKind = query.kind.parse()?;
    let object = ObjectRef { kind, id: query.id };
    let hub = state.hub.read().await;
    let grants = hub.grants_for(&auth.principal, object)?;
    let params = PageParams {
        page: query.page,
        page_size: query.page_size,
    };
    Ok(Json(Page::paginate(
        grants,
        &params,
        state.settings.default_page_size,
    )?))
}

async fn add_grant(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: Result<Json<Grant>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Grant>)> {
    let Json(grant) = payload?;
    let mut hub = state.hub.write().await;
    let grant = hub.grant(&auth.principal, grant)?;
    Ok((StatusCode::CREATED, Json(grant)))
}

async fn revoke_grant(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: Result<Json<Grant>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(grant) = payload?;
    let mut hub = state.hub.write().await;
    hub.revoke(&auth.principal, &grant)?;
    Ok(StatusCode::NO_CONTENT)
}
