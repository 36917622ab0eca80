mod common;

use axum::{ body::Body, http::{ Request, StatusCode } };
use base64::{ engine::general_purpose::STANDARD, Engine as _ };
use serde_json::json;

use common::{ multipart_body, TestApp, UPLOAD_LIMIT };

const BOUNDARY: &str = "relay-test-boundary";

fn multipart_request(filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let body = multipart_body(BOUNDARY, filename, content_type, data);
    Request::builder()
        .method("POST")
        .uri("/conversations/images")
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn small_png_upload_is_hosted() {
    let app = TestApp::standard();

    let (status, body) = app.send(multipart_request("cat.png", "image/png", &[0x89, 0x50, 0x4e, 0x47])).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["imageUrl"], "https://cdn.test/chat_images/1.png");
    assert_eq!(body["publicId"], "chat_images/1");
    assert_eq!(app.host.count(), 1);
}

#[tokio::test]
async fn oversized_upload_is_rejected_before_hosting() {
    let app = TestApp::standard();
    let data = vec![0u8; UPLOAD_LIMIT * 2];

    let (status, body) = app.send(multipart_request("big.png", "image/png", &data)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["success"], false);
    assert_eq!(app.host.count(), 0);
}

#[tokio::test]
async fn non_image_upload_is_refused() {
    let app = TestApp::standard();

    let (status, _) = app.send(multipart_request("notes.txt", "text/plain", b"hello")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.host.count(), 0);
}

#[tokio::test]
async fn oversized_data_uri_is_rejected() {
    let app = TestApp::standard();
    let payload = STANDARD.encode(vec![0u8; UPLOAD_LIMIT + 10]);

    let (status, _) = app.post_json(
        "/conversations/images",
        json!({ "image": format!("data:image/png;base64,{}", payload) })
    ).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(app.host.count(), 0);
}

#[tokio::test]
async fn json_upload_without_image_is_a_bad_request() {
    let app = TestApp::standard();
    let (status, body) = app.post_json("/conversations/images", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No image provided");
}

#[tokio::test]
async fn json_data_uri_upload_is_hosted() {
    let app = TestApp::standard();
    let (status, body) = app.post_json(
        "/conversations/images",
        json!({ "image": "data:image/gif;base64,R0lGODlh" })
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["imageUrl"], "https://cdn.test/chat_images/1.png");
}

#[tokio::test]
async fn json_body_beyond_the_route_limit_is_payload_too_large() {
    let app = TestApp::standard();
    let payload = "A".repeat(100 * 1024);

    let (status, body) = app.post_json(
        "/conversations/images",
        json!({ "image": format!("data:image/png;base64,{}", payload) })
    ).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["success"], false);
    assert_eq!(app.host.count(), 0);
}
