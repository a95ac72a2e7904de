mod common;

use axum::http::StatusCode;
use common::{TestApp, USER};
use serde_json::json;
use tag_hub_core::{EventVerb, ObjectRef, Permission};

#[tokio::test]
async fn tag_create_no_permission() {
    let app = TestApp::new();
    let events = app.event_count().await;

    let (status, _) = app
        .request("POST", "/tags", USER, Some(json!({"label": "t1", "color": "#0a0b0c"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = app.request("GET", "/tags", common::ADMIN, None).await;
    assert_eq!(body["count"], 0);
    assert_eq!(app.event_count().await, events);
}

#[tokio::test]
async fn tag_create_with_permission() {
    let app = TestApp::new();
    app.grant_global(Permission::TagCreate).await;

    let (status, body) = app
        .request("POST", "/tags", USER, Some(json!({"label": "t1", "color": "#0a0b0c"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["label"], "t1");
    assert_eq!(body["color"], "#0a0b0c");

    let id: uuid::Uuid = body["id"].as_str().unwrap().parse().unwrap();
    let target = ObjectRef::tag(id);
    assert_eq!(app.latest_verb(target).await, Some(EventVerb::TagCreated));
    assert_eq!(app.latest_actor(target).await.as_deref(), Some(USER));
}

#[tokio::test]
async fn tag_create_invalid_body() {
    let app = TestApp::new();
    app.grant_global(Permission::TagCreate).await;
    let events = app.event_count().await;

    let (status, body) = app
        .request("POST", "/tags", USER, Some(json!({"label": "  ", "color": "#000000"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    let (status, _) = app
        .request("POST", "/tags", USER, Some(json!({"label": "x", "color": "red"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .request("POST", "/tags", USER, Some(json!({"color": "#000000"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.event_count().await, events);
}

#[tokio::test]
async fn tag_delete_no_permission() {
    let app = TestApp::new();
    let tag = app.create_tag("t1").await;
    let events = app.event_count().await;

    let (status, _) = app
        .request("DELETE", &format!("/tags/{tag}"), USER, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request("GET", &format!("/tags/{tag}"), common::ADMIN, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.event_count().await, events);
}

#[tokio::test]
async fn tag_delete_with_access() {
    let app = TestApp::new();
    let tag = app.create_tag("t1").await;
    app.grant(Permission::TagDelete, ObjectRef::tag(tag)).await;

    let (status, body) = app
        .request("DELETE", &format!("/tags/{tag}"), USER, None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = app
        .request("GET", &format!("/tags/{tag}"), common::ADMIN, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        app.latest_verb(ObjectRef::tag(tag)).await,
        Some(EventVerb::TagDeleted)
    );
}

#[tokio::test]
async fn tag_detail_no_permission() {
    let app = TestApp::new();
    let tag = app.create_tag("t1").await;
    let (status, body) = app.get(&format!("/tags/{tag}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.get("label").is_none());
}

#[tokio::test]
async fn tag_detail_with_access() {
    let app = TestApp::new();
    let tag = app.create_tag("t1").await;
    app.grant(Permission::TagView, ObjectRef::tag(tag)).await;
    let events = app.event_count().await;

    let (status, body) = app.get(&format!("/tags/{tag}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "t1");
    assert_eq!(body["url"], format!("/tags/{tag}"));
    assert_eq!(app.event_count().await, events);
}

#[tokio::test]
async fn tag_detail_unknown_id_not_found() {
    let app = TestApp::new();
    app.grant_global(Permission::TagView).await;
    let (status, _) = app.get(&format!("/tags/{}", uuid::Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tag_edit_via_patch_no_permission() {
    let app = TestApp::new();
    let tag = app.create_tag("t1").await;
    let events = app.event_count().await;

    let (status, _) = app
        .request(
            "PATCH",
            &format!("/tags/{tag}"),
            USER,
            Some(json!({"label": "edited", "color": "#ffffff"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app
        .request("GET", &format!("/tags/{tag}"), common::ADMIN, None)
        .await;
    assert_eq!(body["label"], "t1");
    assert_eq!(body["color"], "#001122");
    assert_eq!(app.event_count().await, events);
}

#[tokio::test]
async fn tag_edit_via_patch_with_access() {
    let app = TestApp::new();
    let tag = app.create_tag("t1").await;
    app.grant(Permission::TagEdit, ObjectRef::tag(tag)).await;

    let (status, body) = app
        .request(
            "PATCH",
            &format!("/tags/{tag}"),
            USER,
            Some(json!({"label": "edited"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "edited");
    assert_eq!(body["color"], "#001122");
    assert_eq!(
        app.latest_verb(ObjectRef::tag(tag)).await,
        Some(EventVerb::TagEdited)
    );
}

#[tokio::test]
async fn tag_edit_via_put_no_permission() {
    let app = TestApp::new();
    let tag = app.create_tag("t1").await;
    let events = app.event_count().await;

    let (status, _) = app
        .request(
            "PUT",
            &format!("/tags/{tag}"),
            USER,
            Some(json!({"label": "edited", "color": "#ffffff"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.event_count().await, events);
}

#[tokio::test]
async fn tag_edit_via_put_with_access() {
    let app = TestApp::new();
    let tag = app.create_tag("t1").await;
    app.grant(Permission::TagEdit, ObjectRef::tag(tag)).await;
    let events = app.event_count().await;

    let (status, body) = app
        .request(
            "PUT",
            &format!("/tags/{tag}"),
            USER,
            Some(json!({"label": "edited", "color": "#ffffff"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "edited");
    assert_eq!(body["color"], "#ffffff");
    assert_eq!(app.event_count().await, events + 1);
    assert_eq!(
        app.latest_actor(ObjectRef::tag(tag)).await.as_deref(),
        Some(USER)
    );
}

#[tokio::test]
async fn tag_edit_via_put_requires_label() {
    let app = TestApp::new();
    let tag = app.create_tag("t1").await;
    app.grant(Permission::TagEdit, ObjectRef::tag(tag)).await;
    let events = app.event_count().await;

    let (status, _) = app
        .request(
            "PUT",
            &format!("/tags/{tag}"),
            USER,
            Some(json!({"color": "#ffffff"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.event_count().await, events);
}

#[tokio::test]
async fn malformed_body_hidden_without_access() {
    let app = TestApp::new();
    let tag = app.create_tag("t1").await;

    let (status, _) = app
        .request("PATCH", &format!("/tags/{tag}"), USER, Some(json!(["not", "a", "patch"])))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.grant(Permission::TagEdit, ObjectRef::tag(tag)).await;
    let (status, _) = app
        .request("PATCH", &format!("/tags/{tag}"), USER, Some(json!(["not", "a", "patch"])))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tag_list_no_permission() {
    let app = TestApp::new();
    app.create_tag("t1").await;
    let (status, body) = app.get("/tags").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn tag_list_with_access() {
    let app = TestApp::new();
    let tag = app.create_tag("t1").await;
    app.create_tag("t2").await;
    app.grant(Permission::TagView, ObjectRef::tag(tag)).await;

    let (status, body) = app.get("/tags").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["label"], "t1");
}

#[tokio::test]
async fn tag_list_paginates() {
    let app = TestApp::new();
    for label in ["a", "b", "c"] {
        app.create_tag(label).await;
    }
    app.grant_global(Permission::TagView).await;

    let (_, body) = app.get("/tags?page_size=2").await;
    assert_eq!(body["count"], 3);
    assert_eq!(body["next"], 2);
    assert!(body["previous"].is_null());
    assert_eq!(body["results"].as_array().unwrap().len(), 2);

    let (_, body) = app.get("/tags?page=2&page_size=2").await;
    assert_eq!(body["results"][0]["label"], "c");
    assert!(body["next"].is_null());
    assert_eq!(body["previous"], 1);

    let (status, _) = app.get("/tags?page=3&page_size=2").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get("/tags?page=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_identity_is_unauthorized() {
    let app = TestApp::new();
    let req = axum::http::Request::builder()
        .uri("/tags")
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = tower::ServiceExt::oneshot(app.app.clone(), req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn superuser_bypasses_checks() {
    let app = TestApp::new();
    let (status, body) = app
        .request("POST", "/tags", common::ADMIN, Some(json!({"label": "root"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["color"], "#000000");
}

#[tokio::test]
async fn malformed_ids_answer_json_not_found() {
    let app = TestApp::new();
    for uri in [
        "/tags/not-a-uuid",
        "/tags/not-a-uuid/documents",
        "/documents/xyz/tags",
        "/events/tag/123",
    ] {
        let (status, body) = app.request("GET", uri, common::ADMIN, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body["status"], 404, "{uri}");
        assert!(body["error"].is_string(), "{uri}");
    }
    let tag = app.create_tag("t1").await;
    let (status, body) = app
        .request("DELETE", &format!("/documents/xyz/tags/{tag}"), common::ADMIN, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}
