use super::tags::TagResponse;
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
use tag_hub_core::storage::Document;
use tag_hub_core::{ObjectRef, Permission};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub url: String,
    pub tags_url: String,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            url: format!("/documents/{}", doc.id),
            tags_url: format!("/documents/{}/tags", doc.id),
            id: doc.id,
            label: doc.label,
            created_at: doc.created_at,
        }
    }
}

#[derive(Deserialize)]
pub struct CreateDocumentRequest {
    pub label: String,
}

#[derive(Deserialize)]
pub struct AttachTagRequest {
    pub tag: Uuid,
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/documents", get(list_documents).post(create_document))
        .route("/documents/{id}", get(get_document).delete(delete_document))
        .route(
            "/documents/{id}/tags",
            get(document_tags).post(attach_tag),
        )
        .route(
            "/documents/{id}/tags/{tag_id}",
            get(document_tag).delete(remove_tag),
        )
}

async fn list_documents(
    State(state): State<AppState>,
    auth: AuthContext,
    params: Result<Query<PageParams>, QueryRejection>,
) -> ApiResult<Json<Page<DocumentResponse>>> {
    let Query(params) = params?;
    let hub = state.hub.read().await;
    let docs = hub
        .list_documents(&auth.principal)
        .into_iter()
        .map(DocumentResponse::from)
        .collect();
    Ok(Json(Page::paginate(
        docs,
        &params,
        state.settings.default_page_size,
    )?))
}

async fn create_document(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: Result<Json<CreateDocumentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<DocumentResponse>)> {
    let mut hub = state.hub.write().await;
    hub.authorize_global(&auth.principal, Permission::DocumentCreate)?;
    let Json(req) = payload?;
    let doc = hub.create_document(&auth.principal, &req.label)?;
    Ok((StatusCode::CREATED, Json(doc.into())))
}

async fn get_document(
    State(state): State<AppState>,
    auth: AuthContext,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<DocumentResponse>> {
    let Path(id) = path?;
    let hub = state.hub.read().await;
    Ok(Json(hub.get_document(&auth.principal, id)?.into()))
}

async fn delete_document(
    State(state): State<AppState>,
    auth: AuthContext,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path?;
    let mut hub = state.hub.write().await;
    hub.delete_document(&auth.principal, id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn document_tags(
    State(state): State<AppState>,
    auth: AuthContext,
    path: Result<Path<Uuid>, PathRejection>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> ApiResult<Json<Page<TagResponse>>> {
    let Path(id) = path?;
    let Query(params) = params?;
    let hub = state.hub.read().await;
    let tags = hub
        .document_tags(&auth.principal, id)?
        .into_iter()
        .map(TagResponse::from)
        .collect();
    Ok(Json(Page::paginate(
        tags,
        &params,
        state.settings.default_page_size,
    )?))
}

async fn attach_tag(
    State(state): State<AppState>,
    auth: AuthContext,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AttachTagRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TagResponse>)> {
    let Path(id) = path?;
    let mut hub = state.hub.write().await;
    // The tag side can only be checked once the body names it.
    hub.authorize(&auth.principal, Permission::TagAttach, ObjectRef::document(id))?;
    let Json(req) = payload?;
    let tag = hub.attach_tag(&auth.principal, id, req.tag)?;
    Ok((StatusCode::CREATED, Json(tag.into())))
}

async fn document_tag(
    State(state): State<AppState>,
    auth: AuthContext,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> ApiResult<Json<TagResponse>> {
    let Path((id, tag_id)) = path?;
    let hub = state.hub.read().await;
    Ok(Json(hub.document_tag(&auth.principal, id, tag_id)?.into()))
}

async fn remove_tag(
    State(state): State<AppState>,
    auth: AuthContext,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path((id, tag_id)) = path?;
    let mut hub = state.hub.write().await;
    hub.remove_tag(&auth.principal, id, tag_id)?;
    Ok(StatusCode::NO_CONTENT)
}
