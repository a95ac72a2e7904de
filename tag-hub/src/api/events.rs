use super::{ApiResult, AppState, AuthContext, Page, PageParams};
use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    response::sse::{self, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use tag_hub_core::{Event, LiveEvent, ObjectKind, ObjectRef};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/events/stream", get(event_stream))
        .route("/events/{kind}/{id}", get(list_events))
        .route("/events/{kind}/{id}/latest", get(latest_event))
}

fn object(kind: &str, id: Uuid) -> ApiResult<ObjectRef> {
    let kind: ObjectKind = kind.parse()?;
    Ok(ObjectRef { kind, id })
}

async fn list_events(
    State(state): State<AppState>,
    auth: AuthContext,
    path: Result<Path<(String, Uuid)>, PathRejection>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> ApiResult<Json<Page<Event>>> {
    let Query(params) = params?;
    let Path((kind, id)) = path?;
    let target = object(&kind, id)?;
    let hub = state.hub.read().await;
    let events = hub.events_for(&auth.principal, target)?;
    Ok(Json(Page::paginate(
        events,
        &params,
        state.settings.default_page_size,
    )?))
}

async fn latest_event(
    State(state): State<AppState>,
    auth: AuthContext,
    path: Result<Path<(String, Uuid)>, PathRejection>,
) -> ApiResult<Json<Event>> {
    let Path((kind, id)) = path?;
    let target = object(&kind, id)?;
    let hub = state.hub.read().await;
    Ok(Json(hub.latest_event(&auth.principal, target)?))
}

/// Live feed of committed events whose target the caller may watch.
async fn event_stream(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Sse<impl Stream<Item = Result<sse::Event, Infallible>>> {
    let rx = state.hub.read().await.subscribe();
    let principal = auth.principal;
    let stream = BroadcastStream::new(rx).filter_map(move |res| {
        let principal = principal.clone();
        async move {
            // lagged receivers skip what they missed
            let LiveEvent { event, .. } = res.ok().filter(|live| live.visible_to(&principal))?;
            let data = serde_json::to_string(&event).ok()?;
            Some(Ok(sse::Event::default()
                .event(event.verb.as_str())
                .data(data)))
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
