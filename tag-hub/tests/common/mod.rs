#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::collections::HashSet;
use tag_hub::api::{self, ApiSettings, AppState};
use tag_hub_core::{EventVerb, Grant, Hub, ObjectRef, Permission, Principal};
use tower::util::ServiceExt;
use uuid::Uuid;

pub const USER: &str = "test_user";
pub const ADMIN: &str = "admin";

pub struct TestApp {
    pub state: AppState,
    pub app: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_hub(Hub::in_memory())
    }

    pub fn with_hub(hub: Hub) -> Self {
        let settings = ApiSettings {
            trust_user_header: true,
            admins: HashSet::from([ADMIN.to_string()]),
            default_page_size: 40,
        };
        let state = AppState::new(hub, None, settings);
        let app = api::router(state.clone());
        Self { state, app }
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        user: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("X-User-Id", user);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let resp = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request("GET", uri, USER, None).await
    }

    pub async fn grant(&self, permission: Permission, object: ObjectRef) {
        let mut hub = self.state.hub.write().await;
        hub.grant(&admin(), Grant::on(USER, permission, object))
            .unwrap();
    }

    pub async fn grant_global(&self, permission: Permission) {
        let mut hub = self.state.hub.write().await;
        hub.bootstrap_grants([Grant::global(USER, permission)])
            .unwrap();
    }

    pub async fn create_tag(&self, label: &str) -> Uuid {
        let mut hub = self.state.hub.write().await;
        hub.create_tag(&admin(), label, Some("#001122")).unwrap().id
    }

    pub async fn create_document(&self, label: &str) -> Uuid {
        let mut hub = self.state.hub.write().await;
        hub.create_document(&admin(), label).unwrap().id
    }

    pub async fn attach(&self, document: Uuid, tag: Uuid) {
        let mut hub = self.state.hub.write().await;
        hub.attach_tag(&admin(), document, tag).unwrap();
    }

    pub async fn is_attached(&self, document: Uuid, tag: Uuid) -> bool {
        let hub = self.state.hub.read().await;
        hub.state().store.is_attached(tag, document)
    }

    pub async fn event_count(&self) -> usize {
        self.state.hub.read().await.state().events.len()
    }

    pub async fn latest_verb(&self, target: ObjectRef) -> Option<EventVerb> {
        let hub = self.state.hub.read().await;
        hub.state().events.latest_for(target).map(|e| e.verb)
    }

    pub async fn latest_actor(&self, target: ObjectRef) -> Option<String> {
        let hub = self.state.hub.read().await;
        hub.state().events.latest_for(target).map(|e| e.actor.clone())
    }
}

pub fn admin() -> Principal {
    Principal::superuser(ADMIN)
}
