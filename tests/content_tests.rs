mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{Session, TestApp, create_test_app};
use serde_json::json;
use tower::ServiceExt;

const BOUNDARY: &str = "postboard-test-boundary";

async fn create_post(app: &TestApp, session: &Session, title: &str) -> String {
    let (status, body) = app
        .send(
            "POST",
            "/post",
            Some(&session.access_token),
            Some(json!({ "title": title, "content": "Body" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(token: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/file")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).unwrap()
}

// === Posts ===

#[tokio::test]
async fn test_create_post_response() {
    let app = create_test_app().await;
    let alice = app.register_and_login("alice@example.com").await;

    let (status, body) = app
        .send(
            "POST",
            "/post",
            Some(&alice.access_token),
            Some(json!({ "title": "Hello", "content": "World" })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["title"], "Hello");
    assert_eq!(body["content"], "World");
    assert_eq!(body["senderId"], alice.id.as_str());
    assert_eq!(body["likes"], 0);
}

#[tokio::test]
async fn test_create_post_missing_fields() {
    let app = create_test_app().await;
    let alice = app.register_and_login("alice@example.com").await;

    let (status, _) = app
        .send(
            "POST",
            "/post",
            Some(&alice.access_token),
            Some(json!({ "title": "Only a title" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_posts_with_sender_filter() {
    let app = create_test_app().await;
    let alice = app.register_and_login("alice@example.com").await;
    let bob = app.register_and_login("bob@example.com").await;

    create_post(&app, &alice, "first").await;
    create_post(&app, &alice, "second").await;
    create_post(&app, &bob, "other").await;

    let (status, all) = app.send("GET", "/post", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 3);

    let (status, mine) = app
        .send("GET", &format!("/post?sender={}", alice.id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let mine = mine.as_array().unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|p| p["senderId"] == alice.id.as_str()));
}

#[tokio::test]
async fn test_get_post_bad_and_missing_ids() {
    let app = create_test_app().await;

    let (status, _) = app.send("GET", "/post/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            "GET",
            "/post/550e8400-e29b-41d4-a716-446655440000",
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// === Likes ===

#[tokio::test]
async fn test_like_and_unlike_post() {
    let app = create_test_app().await;
    let alice = app.register_and_login("alice@example.com").await;
    let bob = app.register_and_login("bob@example.com").await;
    let post_id = create_post(&app, &alice, "likeable").await;
    let uri = format!("/post/{post_id}/like");

    let (status, body) = app.send("POST", &uri, Some(&bob.access_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["liked"], true);
    assert_eq!(body["likes"], 1);

    // Liking twice does not double count
    let (_, body) = app.send("POST", &uri, Some(&bob.access_token), None).await;
    assert_eq!(body["likes"], 1);

    let (_, body) = app.send("POST", &uri, Some(&alice.access_token), None).await;
    assert_eq!(body["likes"], 2);

    let (_, post) = app
        .send("GET", &format!("/post/{post_id}"), None, None)
        .await;
    assert_eq!(post["likes"], 2);

    let (status, body) = app
        .send("DELETE", &uri, Some(&bob.access_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["liked"], false);
    assert_eq!(body["likes"], 1);
}

#[tokio::test]
async fn test_like_requires_auth_and_existing_post() {
    let app = create_test_app().await;
    let alice = app.register_and_login("alice@example.com").await;
    let post_id = create_post(&app, &alice, "p").await;

    let (status, _) = app
        .send("POST", &format!("/post/{post_id}/like"), None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(
            "POST",
            "/post/550e8400-e29b-41d4-a716-446655440000/like",
            Some(&alice.access_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// === Comments ===

#[tokio::test]
async fn test_comments_filtered_by_post() {
    let app = create_test_app().await;
    let alice = app.register_and_login("alice@example.com").await;
    let first = create_post(&app, &alice, "first").await;
    let second = create_post(&app, &alice, "second").await;

    for (post_id, message) in [(&first, "a"), (&first, "b"), (&second, "c")] {
        let (status, body) = app
            .send(
                "POST",
                "/comment",
                Some(&alice.access_token),
                Some(json!({ "postId": post_id, "message": message })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["postId"], post_id.as_str());
        assert_eq!(body["senderId"], alice.id.as_str());
    }

    let (_, all) = app.send("GET", "/comment", None, None).await;
    assert_eq!(all.as_array().unwrap().len(), 3);

    let (status, on_first) = app
        .send("GET", &format!("/comment?postId={first}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let messages: Vec<_> = on_first
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["message"].as_str().unwrap())
        .collect();
    assert_eq!(messages, vec!["a", "b"]);
}

#[tokio::test]
async fn test_create_comment_validation() {
    let app = create_test_app().await;
    let alice = app.register_and_login("alice@example.com").await;

    let (status, _) = app
        .send(
            "POST",
            "/comment",
            Some(&alice.access_token),
            Some(json!({ "message": "orphan" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            "POST",
            "/comment",
            Some(&alice.access_token),
            Some(json!({ "postId": "nope", "message": "m" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            "POST",
            "/comment",
            Some(&alice.access_token),
            Some(json!({
                "postId": "550e8400-e29b-41d4-a716-446655440000",
                "message": "m",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_post_removes_its_comments() {
    let app = create_test_app().await;
    let alice = app.register_and_login("alice@example.com").await;
    let post_id = create_post(&app, &alice, "p").await;

    let (_, comment) = app
        .send(
            "POST",
            "/comment",
            Some(&alice.access_token),
            Some(json!({ "postId": post_id, "message": "m" })),
        )
        .await;
    let comment_id = comment["id"].as_str().unwrap();

    app.send(
        "DELETE",
        &format!("/post/{post_id}"),
        Some(&alice.access_token),
        None,
    )
    .await;

    let (status, _) = app
        .send("GET", &format!("/comment/{comment_id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// === Users ===

#[tokio::test]
async fn test_get_user_profile() {
    let app = create_test_app().await;
    let alice = app.register_and_login("alice@example.com").await;

    let (status, body) = app
        .send("GET", &format!("/user/{}", alice.id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "alice@example.com");
    assert!(body.get("passwordHash").is_none());

    let (status, _) = app.send("GET", "/user/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// === Files ===

#[tokio::test]
async fn test_upload_and_download_file() {
    let app = create_test_app().await;
    let alice = app.register_and_login("alice@example.com").await;

    let data = b"\x89PNG fake image bytes";
    let (status, body) = app
        .send_request(upload_request(
            Some(&alice.access_token),
            multipart_body("file", "cat.png", "image/png", data),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let id = body["id"].as_str().unwrap();
    assert_eq!(body["url"], format!("/file/{id}"));

    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/file/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "inline; filename=\"cat.png\""
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], &data[..]);
}

#[tokio::test]
async fn test_html_upload_is_served_as_download() {
    let app = create_test_app().await;
    let alice = app.register_and_login("alice@example.com").await;

    let (status, body) = app
        .send_request(upload_request(
            Some(&alice.access_token),
            multipart_body(
                "file",
                "page.html",
                "text/html",
                b"<script>alert(document.cookie)</script>",
            ),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/file/{}", body["id"].as_str().unwrap()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap();
    assert!(disposition.starts_with("attachment;"), "{disposition}");
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let app = create_test_app().await;
    let alice = app.register_and_login("alice@example.com").await;

    let (status, body) = app
        .send_request(upload_request(
            Some(&alice.access_token),
            multipart_body("other", "x.txt", "text/plain", b"hi"),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "File not provided");
}

#[tokio::test]
async fn test_upload_requires_auth() {
    let app = create_test_app().await;

    let (status, _) = app
        .send_request(upload_request(
            None,
            multipart_body("file", "x.txt", "text/plain", b"hi"),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_only_uploader_can_delete_file() {
    let app = create_test_app().await;
    let alice = app.register_and_login("alice@example.com").await;
    let bob = app.register_and_login("bob@example.com").await;

    let (_, body) = app
        .send_request(upload_request(
            Some(&alice.access_token),
            multipart_body("file", "x.txt", "text/plain", b"hi"),
        ))
        .await;
    let uri = format!("/file/{}", body["id"].as_str().unwrap());

    let (status, _) = app.send("DELETE", &uri, Some(&bob.access_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send("DELETE", &uri, Some(&alice.access_token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.send("GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
