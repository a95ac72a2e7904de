//! HTTP API layer exposing tag, document, grant, event and statistics endpoints.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequestParts,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tag_hub_core::auth::TokenVerifier;
use tag_hub_core::{Error, Hub, Principal};
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

mod documents;
mod events;
mod grants;
mod statistics;
mod tags;

pub const MAX_PAGE_SIZE: usize = 1000;

/// Request-independent API settings.
#[derive(Clone, Debug)]
pub struct ApiSettings {
    /// Accept `X-User-Id` / `X-Roles` headers when no bearer token is sent.
    pub trust_user_header: bool,
    /// Users treated as superusers.
    pub admins: HashSet<String>,
    pub default_page_size: usize,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            trust_user_header: true,
            admins: HashSet::new(),
            default_page_size: 40,
        }
    }
}

/// Shared application state containing the hub.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<RwLock<Hub>>,
    pub verifier: Option<Arc<dyn TokenVerifier>>,
    pub settings: Arc<ApiSettings>,
}

impl AppState {
    pub fn new(hub: Hub, verifier: Option<Arc<dyn TokenVerifier>>, settings: ApiSettings) -> Self {
        Self {
            hub: Arc::new(RwLock::new(hub)),
            verifier,
            settings: Arc::new(settings),
        }
    }
}

/// Authentication context extracted from request headers.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub principal: Principal,
}

impl AuthContext {
    fn new(user_id: String, roles: Vec<String>, settings: &ApiSettings) -> Self {
        let superuser = settings.admins.contains(&user_id);
        let mut principal = Principal::user(user_id).with_roles(roles);
        principal.superuser = superuser;
        Self { principal }
    }
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;
        if let Some(auth) = headers.get("Authorization").and_then(|v| v.to_str().ok()) {
            if let (Some(token), Some(verifier)) = (auth.strip_prefix("Bearer "), &state.verifier) {
                if let Some(claims) = verifier.verify(token).await {
                    return Ok(Self::new(claims.sub, claims.roles, &state.settings));
                }
            }
            return Err(ApiError::Unauthorized);
        }
        if !state.settings.trust_user_header {
            return Err(ApiError::Unauthorized);
        }
        let user = headers
            .get("X-User-Id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or(ApiError::Unauthorized)?;
        let roles = headers
            .get("X-Roles")
            .and_then(|v| v.to_str().ok())
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self::new(user, roles, &state.settings))
    }
}

/// Error type returned by every handler.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Hub(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Hub(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Hub(Error::validation(rejection.body_text()))
    }
}

/// A path that does not parse names no object, so it is reported like a
/// missing one.
impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!(reason = %rejection.body_text(), "rejected request path");
        ApiError::Hub(Error::NotFound)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Hub(Error::validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "missing or invalid credentials".to_string(),
            ),
            ApiError::Hub(err) => {
                let status = match &err {
                    Error::PermissionDenied => StatusCode::FORBIDDEN,
                    Error::NotFound => StatusCode::NOT_FOUND,
                    Error::Validation(_) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if !err.is_client_error() {
                    tracing::error!(error = %err, "request failed");
                }
                (status, err.to_string())
            }
        };
        let body = Json(json!({
            "error": message,
            "status": status.as_u16()
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Deserialize, Debug, Default)]
pub struct PageParams {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

/// Paginated list body.
#[derive(Serialize, Deserialize, Debug)]
pub struct Page<T> {
    pub count: usize,
    pub next: Option<usize>,
    pub previous: Option<usize>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Slice `items` according to `params`. Page 1 always exists; later
    /// pages past the end are not found.
    pub fn paginate(items: Vec<T>, params: &PageParams, default_size: usize) -> ApiResult<Self> {
        let page = params.page.unwrap_or(1);
        if page == 0 {
            return Err(Error::validation("page numbers start at 1").into());
        }
        let size = params
            .page_size
            .unwrap_or(default_size)
            .clamp(1, MAX_PAGE_SIZE);
        let count = items.len();
        let start = (page - 1).saturating_mul(size);
        if page > 1 && start >= count {
            return Err(Error::NotFound.into());
        }
        let results: Vec<T> = items.into_iter().skip(start).take(size).collect();
        let next = (start + results.len() < count).then_some(page + 1);
        let previous = (page > 1).then(|| page - 1);
        Ok(Self {
            count,
            next,
            previous,
            results,
        })
    }
}

async fn health() -> &'static str {
    "OK"
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(tags::routes())
        .merge(documents::routes())
        .merge(grants::routes())
        .merge(events::routes())
        .merge(statistics::routes())
        .route("/health", get(health))
        .with_state(state)
}

/// Router with the HTTP middleware stack applied.
pub fn app(state: AppState) -> Router {
    router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<usize>, page_size: Option<usize>) -> PageParams {
        PageParams { page, page_size }
    }

    #[test]
    fn paginate_walks_pages() {
        let items: Vec<u32> = (0..5).collect();
        let first = Page::paginate(items.clone(), &params(None, Some(2)), 40).unwrap();
        assert_eq!(first.count, 5);
        assert_eq!(first.results, vec![0, 1]);
        assert_eq!(first.next, Some(2));
        assert_eq!(first.previous, None);

        let last = Page::paginate(items.clone(), &params(Some(3), Some(2)), 40).unwrap();
        assert_eq!(last.results, vec![4]);
        assert_eq!(last.next, None);
        assert_eq!(last.previous, Some(2));

        assert!(Page::paginate(items.clone(), &params(Some(4), Some(2)), 40).is_err());
        assert!(Page::paginate(items, &params(Some(0), None), 40).is_err());
    }

    #[test]
    fn empty_first_page_is_valid() {
        let page = Page::<u32>::paginate(Vec::new(), &PageParams::default(), 40).unwrap();
        assert_eq!(page.count, 0);
        assert!(page.results.is_empty());
        assert_eq!(page.next, None);
    }
}
