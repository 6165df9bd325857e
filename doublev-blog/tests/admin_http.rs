use actix_web::http::{header, StatusCode};
use actix_web::{test, App};
use chrono::Duration;
use serde_json::Value;
use std::sync::Arc;

use doublev_blog::application::{BlogServices, COMMENTS_RESOURCE, POSTS_RESOURCE};
use doublev_blog::data::MemoryStorage;
use doublev_blog::infrastructure::{jwt::JwtService, url::UrlBuilder};
use doublev_blog::presentation::routes;

const SECRET: &str = "admin-http-test-secret-0123456789";

fn token(resources: &[&str]) -> String {
    JwtService::new(SECRET)
        .unwrap()
        .generate_token(
            "admin",
            resources.iter().map(|r| r.to_string()).collect(),
            Duration::hours(1),
        )
        .unwrap()
}

fn bearer(resources: &[&str]) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {}", token(resources)))
}

fn setup() -> (Arc<MemoryStorage>, BlogServices) {
    let storage = Arc::new(MemoryStorage::new());
    let services = BlogServices::new(storage.clone(), UrlBuilder::new("/admin"));
    (storage, services)
}

macro_rules! app {
    ($services:expr) => {
        test::init_service(App::new().configure(|cfg| {
            routes::configure(
                cfg,
                $services.clone(),
                Arc::new(JwtService::new(SECRET).unwrap()),
                "/admin",
            )
        }))
        .await
    };
}

fn location<B>(resp: &actix_web::dev::ServiceResponse<B>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn message_texts(page: &Value) -> Vec<String> {
    page["messages"]
        .as_array()
        .map(|messages| {
            messages
                .iter()
                .filter_map(|m| m["text"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[actix_rt::test]
async fn requests_without_a_token_are_unauthorized() {
    let (_, services) = setup();
    let app = app!(services);

    let req = test::TestRequest::get()
        .uri("/admin/doublev_blog/post/index")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn missing_resource_tag_is_forbidden() {
    let (_, services) = setup();
    let app = app!(services);

    let req = test::TestRequest::get()
        .uri("/admin/doublev_blog/comment/index")
        .insert_header(bearer(&[POSTS_RESOURCE]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap_or_default().starts_with("Forbidden"));
}

#[actix_rt::test]
async fn tokens_without_resources_are_refused_at_the_door() {
    let (_, services) = setup();
    let app = app!(services);

    let req = test::TestRequest::get()
        .uri("/rest/V1/doublev_blog/posts/1")
        .insert_header(bearer(&[]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri("/admin/doublev_blog/post/index")
        .insert_header((header::AUTHORIZATION, "Bearer not-a-token"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
}

#[actix_rt::test]
async fn seeded_post_shows_in_the_grid() {
    let (_, services) = setup();
    services.patches().apply_pending().await.unwrap();
    let app = app!(services);

    let req = test::TestRequest::get()
        .uri("/admin/doublev_blog/post/index")
        .insert_header(bearer(&[POSTS_RESOURCE]))
        .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(page["title"], "Posts");
    assert_eq!(page["data"]["totalRecords"], 1);
    let row = &page["data"]["items"][0];
    assert_eq!(row["title"], "Hello World - DoubleV Blog");
    assert_eq!(row["author"], "DoubleV Partners");
    assert_eq!(row["is_active"], true);
    assert_eq!(
        row["actions"]["edit"]["href"],
        "/admin/doublev_blog/post/edit?post_id=1"
    );
}

#[actix_rt::test]
async fn save_redirects_and_reports_success() {
    let (_, services) = setup();
    let app = app!(services);

    let req = test::TestRequest::post()
        .uri("/admin/doublev_blog/post/save")
        .insert_header(bearer(&[POSTS_RESOURCE]))
        .set_form(&[
            ("post_id", ""),
            ("title", "First"),
            ("content", "Body"),
            ("author", "Ann"),
            ("is_active", "true"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/admin/doublev_blog/post/index");

    let req = test::TestRequest::get()
        .uri("/admin/doublev_blog/post/index?title=irs")
        .insert_header(bearer(&[POSTS_RESOURCE]))
        .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(message_texts(&page), vec!["You saved the post."]);
    assert_eq!(page["data"]["totalRecords"], 1);
    assert_eq!(page["data"]["items"][0]["is_active"], true);

    // messages are shown once
    let req = test::TestRequest::get()
        .uri("/admin/doublev_blog/post/index")
        .insert_header(bearer(&[POSTS_RESOURCE]))
        .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert!(message_texts(&page).is_empty());
}

#[actix_rt::test]
async fn save_and_continue_returns_to_the_editor() {
    let (_, services) = setup();
    let app = app!(services);

    let req = test::TestRequest::post()
        .uri("/admin/doublev_blog/post/save?back=edit")
        .insert_header(bearer(&[POSTS_RESOURCE]))
        .set_form(&[("title", "Draft")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), "/admin/doublev_blog/post/edit?post_id=1");

    let req = test::TestRequest::get()
        .uri("/admin/doublev_blog/post/edit?post_id=1")
        .insert_header(bearer(&[POSTS_RESOURCE]))
        .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["title"], "Edit Post");
    assert_eq!(page["data"]["1"]["title"], "Draft");
}

#[actix_rt::test]
async fn failed_save_redisplays_the_submitted_form() {
    let (storage, services) = setup();
    let app = app!(services);

    let req = test::TestRequest::post()
        .uri("/admin/doublev_blog/post/save")
        .insert_header(bearer(&[POSTS_RESOURCE]))
        .set_form(&[("title", "Original")])
        .to_request();
    test::call_service(&app, req).await;

    storage.set_fail_writes(true);
    let req = test::TestRequest::post()
        .uri("/admin/doublev_blog/post/save")
        .insert_header(bearer(&[POSTS_RESOURCE]))
        .set_form(&[("post_id", "1"), ("title", "Changed")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/admin/doublev_blog/post/edit?post_id=1");
    storage.set_fail_writes(false);

    let edit = || {
        test::TestRequest::get()
            .uri("/admin/doublev_blog/post/edit?post_id=1")
            .insert_header(bearer(&[POSTS_RESOURCE]))
            .to_request()
    };

    let page: Value = test::call_and_read_body_json(&app, edit()).await;
    assert_eq!(page["data"]["1"]["title"], "Changed");
    assert_eq!(
        message_texts(&page),
        vec!["You saved the post.", "Connection lost while writing"]
    );

    let page: Value = test::call_and_read_body_json(&app, edit()).await;
    assert_eq!(page["data"]["1"]["title"], "Original");
}

#[actix_rt::test]
async fn editing_a_missing_post_redirects_with_a_message() {
    let (_, services) = setup();
    let app = app!(services);

    let req = test::TestRequest::get()
        .uri("/admin/doublev_blog/post/edit?post_id=77")
        .insert_header(bearer(&[POSTS_RESOURCE]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/admin/doublev_blog/post/index");

    let req = test::TestRequest::get()
        .uri("/admin/doublev_blog/post/index")
        .insert_header(bearer(&[POSTS_RESOURCE]))
        .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(message_texts(&page), vec!["This post no longer exists."]);
}

#[actix_rt::test]
async fn new_post_form_is_empty() {
    let (_, services) = setup();
    services.patches().apply_pending().await.unwrap();
    let app = app!(services);

    let req = test::TestRequest::get()
        .uri("/admin/doublev_blog/post/new")
        .insert_header(bearer(&[POSTS_RESOURCE]))
        .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["title"], "New Post");
    assert_eq!(page["data"], serde_json::json!({}));
}

#[actix_rt::test]
async fn delete_and_mass_delete() {
    let (_, services) = setup();
    let app = app!(services);

    for title in ["a", "b", "c", "d"] {
        let req = test::TestRequest::post()
            .uri("/admin/doublev_blog/post/save")
            .insert_header(bearer(&[POSTS_RESOURCE]))
            .set_form(&[("title", title)])
            .to_request();
        test::call_service(&app, req).await;
    }

    let req = test::TestRequest::post()
        .uri("/admin/doublev_blog/post/delete?post_id=2")
        .insert_header(bearer(&[POSTS_RESOURCE]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), "/admin/doublev_blog/post/index");

    let req = test::TestRequest::post()
        .uri("/admin/doublev_blog/post/massdelete")
        .insert_header(bearer(&[POSTS_RESOURCE]))
        .set_form(&[("excluded", "4")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let req = test::TestRequest::get()
        .uri("/admin/doublev_blog/post/index")
        .insert_header(bearer(&[POSTS_RESOURCE]))
        .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    let messages = message_texts(&page);
    assert!(messages.contains(&"You deleted the post.".to_string()));
    assert!(messages.contains(&"A total of 2 record(s) have been deleted.".to_string()));
    assert_eq!(page["data"]["totalRecords"], 1);
    assert_eq!(page["data"]["items"][0]["title"], "d");
}

#[actix_rt::test]
async fn comment_grid_filters_by_post() {
    let (_, services) = setup();
    let app = app!(services);

    for post_id in ["1", "2", "1"] {
        let req = test::TestRequest::post()
            .uri("/rest/V1/doublev_blog/comments")
            .insert_header(bearer(&[COMMENTS_RESOURCE]))
            .set_json(serde_json::json!({ "post_id": post_id, "content": "hi" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let req = test::TestRequest::get()
        .uri("/admin/doublev_blog/comment/index?post_id=1")
        .insert_header(bearer(&[COMMENTS_RESOURCE]))
        .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["title"], "Comments");
    assert_eq!(page["data"]["totalRecords"], 2);
    assert!(page["data"]["items"][0].get("actions").is_none());
}
