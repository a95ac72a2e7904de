use super::documents::DocumentResponse;
use super::{ApiResult, AppState, AuthContext, Page, PageParams};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tag_hub_core::storage::{Tag, TagPatch};
use tag_hub_core::{ObjectRef, Permission};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug)]
pub struct TagResponse {
    pub id: Uuid,
    pub label: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub url: String,
    pub documents_url: String,
}

impl From<Tag> for TagResponse {
    fn from(tag: Tag) -> Self {
        Self {
            url: format!("/tags/{}", tag.id),
            documents_url: format!("/tags/{}/documents", tag.id),
            id: tag.id,
            label: tag.label,
            color: tag.color,
            created_at: tag.created_at,
        }
    }
}

#[derive(Deserialize)]
pub struct CreateTagRequest {
    pub label: String,
    pub color: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct ReplaceTagRequest {
    pub label: Option<String>,
    pub color: Option<String>,
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/tags", get(list_tags).post(create_tag))
        .route(
            "/tags/{id}",
            get(get_tag)
                .put(replace_tag)
                .patch(update_tag)
                .delete(delete_tag),
        )
        .route("/tags/{id}/documents", get(tag_documents))
}

async fn list_tags(
    State(state): State<AppState>,
    auth: AuthContext,
    params: Result<Query<PageParams>, QueryRejection>,
) -> ApiResult<Json<Page<TagResponse>>> {
    let Query(params) = params?;
    let hub = state.hub.read().await;
    let tags = hub
        .list_tags(&auth.principal)
        .into_iter()
        .map(TagResponse::from)
        .collect();
    Ok(Json(Page::paginate(
        tags,
        &params,
        state.settings.default_page_size,
    )?))
}

async fn create_tag(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: Result<Json<CreateTagRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TagResponse>)> {
    let mut hub = state.hub.write().await;
    // Without tag_create the body is never looked at.
    hub.authorize_global(&auth.principal, Permission::TagCreate)?;
    let Json(req) = payload?;
    let tag = hub.create_tag(&auth.principal, &req.label, req.color.as_deref())?;
    Ok((StatusCode::CREATED, Json(tag.into())))
}

async fn get_tag(
    State(state): State<AppState>,
    auth: AuthContext,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<TagResponse>> {
    let Path(id) = path?;
    let hub = state.hub.read().await;
    let tag = hub.get_tag(&auth.principal, id)?;
    Ok(Json(tag.into()))
}

async fn replace_tag(
    State(state): State<AppState>,
    auth: AuthContext,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ReplaceTagRequest>, JsonRejection>,
) -> ApiResult<Json<TagResponse>> {
    let Path(id) = path?;
    let mut hub = state.hub.write().await;
    hub.authorize(&auth.principal, Permission::TagEdit, ObjectRef::tag(id))?;
    let Json(req) = payload?;
    let tag = hub.replace_tag(
        &auth.principal,
        id,
        req.label.as_deref(),
        req.color.as_deref(),
    )?;
    Ok(Json(tag.into()))
}

async fn update_tag(
    State(state): State<AppState>,
    auth: AuthContext,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<TagPatch>, JsonRejection>,
) -> ApiResult<Json<TagResponse>> {
    let Path(id) = path?;
    let mut hub = state.hub.write().await;
    hub.authorize(&auth.principal, Permission::TagEdit, ObjectRef::tag(id))?;
    let Json(patch) = payload?;
    let tag = hub.update_tag(&auth.principal, id, &patch)?;
    Ok(Json(tag.into()))
}

async fn delete_tag(
    State(state): State<AppState>,
    auth: AuthContext,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path?;
    let mut hub = state.hub.write().await;
    hub.delete_tag(&auth.principal, id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn tag_documents(
    State(state): State<AppState>,
    auth: AuthContext,
    path: Result<Path<Uuid>, PathRejection>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> ApiResult<Json<Page<DocumentResponse>>> {
    let Path(id) = path?;
    let Query(params) = params?;
    let hub = state.hub.read().await;
    let docs = hub
        .tag_documents(&auth.principal, id)?
        .into_iter()
        .map(DocumentResponse::from)
        .collect();
    Ok(Json(Page::paginate(
        docs,
        &params,
        state.settings.default_page_size,
    )?))
}
