//! API integration tests for the generation pipeline and result sharing.
//!
//! Tests verify:
//! - Upload acceptance and rejection
//! - Generation success, quota exhaustion and failure mapping
//! - Result lookup, share pages and blob serving
//! - HTTP response codes and headers

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use festive_photo::{ImageData, PhotoResult};

use super::test_utils::{
    create_test_jpeg, dimensions_of, generate_request, get_request, json_request, multipart_body,
    test_app, test_app_with_counter, upload_request, UnreachableCounter, TEST_PUBLIC_URL,
};

async fn json_body(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn text_body(response: axum::response::Response) -> String {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(body.to_vec()).unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app(2);

    let response = app.router.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].is_string());
}

// =============================================================================
// Upload
// =============================================================================

#[tokio::test]
async fn test_upload_returns_base64() {
    let app = test_app(2);
    let jpeg = create_test_jpeg(32, 16);
    let body = multipart_body("image", "tree.jpg", "image/jpeg", &jpeg);

    let response = app.router.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["mimeType"], "image/jpeg");
    assert_eq!(json["name"], "tree.jpg");
    assert_eq!(json["size"], jpeg.len());

    let decoded = ImageData::from_base64(json["data"].as_str().unwrap(), "image/jpeg").unwrap();
    assert_eq!(decoded.data.as_ref(), jpeg.as_slice());
}

#[tokio::test]
async fn test_upload_rejects_non_image() {
    let app = test_app(2);
    let body = multipart_body("image", "notes.txt", "text/plain", b"hello");

    let response = app.router.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "invalid_request");
    assert_eq!(json["message"], "File must be an image");
}

#[tokio::test]
async fn test_upload_without_image_field() {
    let app = test_app(2);
    let body = multipart_body("attachment", "tree.jpg", "image/jpeg", b"\xFF\xD8\xFF");

    let response = app.router.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["message"], "No file uploaded");
}

#[tokio::test]
async fn test_upload_too_large() {
    let app = test_app(2);
    let oversized = vec![0u8; 3 * 1024 * 1024 + 1];
    let body = multipart_body("image", "huge.jpg", "image/jpeg", &oversized);

    let response = app.router.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert!(json["message"].as_str().unwrap().contains("too large"));
}

// =============================================================================
// Generation
// =============================================================================

#[tokio::test]
async fn test_generate_success() {
    let app = test_app(2);
    let jpeg = create_test_jpeg(2000, 1000);

    let response = app
        .router
        .clone()
        .oneshot(generate_request("203.0.113.7", &jpeg, Some("add snow")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;

    assert_eq!(json["rateLimitInfo"]["success"], true);
    assert_eq!(json["rateLimitInfo"]["remaining"], 1);
    assert_eq!(json["rateLimitInfo"]["limit"], 2);
    assert!(json.get("error").is_none());

    let generated = ImageData::from_data_url(json["imageData"].as_str().unwrap()).unwrap();
    assert_eq!(generated.media_type, "image/png");
    assert_eq!(generated.data.as_ref(), app.backend.output());
    assert_eq!(app.backend.calls(), 1);

    let result: PhotoResult = serde_json::from_value(json["photoResult"].clone()).unwrap();
    assert_eq!(result.id.len(), 10);
    assert_eq!(
        result.original_url,
        format!("{}/blobs/christmas/{}/original", TEST_PUBLIC_URL, result.id)
    );

    // The stored original is the normalized upload
    let (original, content_type) = app.blobs.get_by_url(&result.original_url).await.unwrap();
    assert_eq!(content_type, "image/jpeg");
    assert_eq!(dimensions_of(&original), (1024, 512));
}

#[tokio::test]
async fn test_generate_quota_exhausted() {
    let app = test_app(2);
    let jpeg = create_test_jpeg(64, 64);

    for expected_remaining in [1, 0] {
        let response = app
            .router
            .clone()
            .oneshot(generate_request("198.51.100.1", &jpeg, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["rateLimitInfo"]["remaining"], expected_remaining);
    }

    let response = app
        .router
        .clone()
        .oneshot(generate_request("198.51.100.1", &jpeg, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .headers()
        .get(header::RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 24 * 60 * 60);

    let json = json_body(response).await;
    assert!(json["imageData"].is_null());
    assert_eq!(json["rateLimitInfo"]["success"], false);
    assert_eq!(json["rateLimitInfo"]["remaining"], 0);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("You've reached the daily limit of 2 images"));

    // The model was never called for the rejected request
    assert_eq!(app.backend.calls(), 2);
}

#[tokio::test]
async fn test_generate_quota_is_per_client() {
    let app = test_app(1);
    let jpeg = create_test_jpeg(64, 64);

    let first = app
        .router
        .clone()
        .oneshot(generate_request("10.0.0.1", &jpeg, None))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let other = app
        .router
        .clone()
        .oneshot(generate_request("10.0.0.2", &jpeg, None))
        .await
        .unwrap();
    assert_eq!(other.status(), StatusCode::OK);

    let again = app
        .router
        .oneshot(generate_request("10.0.0.1", &jpeg, None))
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_generate_missing_image_does_not_consume_quota() {
    let app = test_app(2);

    let response = app
        .router
        .clone()
        .oneshot(json_request("192.0.2.9", serde_json::json!({ "prompt": "hi" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "No file uploaded");
    assert_eq!(json["rateLimitInfo"]["remaining"], 2);
    assert!(json["imageData"].is_null());
    assert_eq!(app.backend.calls(), 0);

    let quota = app
        .router
        .oneshot(
            Request::builder()
                .uri("/api/quota")
                .header("x-forwarded-for", "192.0.2.9")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = json_body(quota).await;
    assert_eq!(json["remaining"], 2);
}

#[tokio::test]
async fn test_generate_malformed_json() {
    let app = test_app(2);

    let request = Request::builder()
        .method("POST")
        .uri("/api/generate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid request body"));
}

#[tokio::test]
async fn test_generate_rejects_wrong_media_type() {
    let app = test_app(2);
    let body = serde_json::json!({
        "image": { "data": "aGVsbG8=", "mimeType": "application/pdf" },
    });

    let response = app
        .router
        .oneshot(json_request("192.0.2.10", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "File must be an image");
}

#[tokio::test]
async fn test_generate_backend_failure() {
    let app = test_app(2);
    app.backend.set_failing(true);
    let jpeg = create_test_jpeg(64, 64);

    let response = app
        .router
        .clone()
        .oneshot(generate_request("192.0.2.11", &jpeg, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = json_body(response).await;
    assert_eq!(json["error"], "Failed to generate image. Please try again.");
    assert!(!json.to_string().contains("trace id"));
    assert!(json.get("photoResult").is_none());

    // The attempt still counts against the quota
    assert_eq!(json["rateLimitInfo"]["remaining"], 1);
    assert!(app.blobs.is_empty().await);
}

#[tokio::test]
async fn test_generate_rate_limiter_unavailable() {
    let app = test_app_with_counter(Arc::new(UnreachableCounter), 2);
    let jpeg = create_test_jpeg(64, 64);

    let response = app
        .router
        .oneshot(generate_request("192.0.2.12", &jpeg, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = json_body(response).await;
    assert_eq!(json["rateLimitInfo"]["success"], false);
    assert_eq!(app.backend.calls(), 0);
}

#[tokio::test]
async fn test_anonymous_clients_share_a_bucket() {
    let app = test_app(1);
    let jpeg = create_test_jpeg(16, 16);
    let body = serde_json::json!({
        "image": { "data": ImageData::new(jpeg, "image/jpeg").to_base64(), "mimeType": "image/jpeg" },
    });

    let request = || {
        Request::builder()
            .method("POST")
            .uri("/api/generate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    let first = app.router.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.router.oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

// =============================================================================
// Quota
// =============================================================================

#[tokio::test]
async fn test_quota_endpoint() {
    let app = test_app(2);

    let response = app.router.oneshot(get_request("/api/quota")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["remaining"], 2);
    assert_eq!(json["limit"], 2);
    assert!(json["reset"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_quota_endpoint_limiter_down() {
    let app = test_app_with_counter(Arc::new(UnreachableCounter), 2);

    let response = app.router.oneshot(get_request("/api/quota")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = json_body(response).await;
    assert_eq!(json["error"], "rate_limiter_unavailable");
}

// =============================================================================
// Results and Sharing
// =============================================================================

async fn generate_one(app: &super::test_utils::TestApp) -> PhotoResult {
    let jpeg = create_test_jpeg(64, 48);
    let response = app
        .router
        .clone()
        .oneshot(generate_request("203.0.113.50", &jpeg, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    serde_json::from_value(json["photoResult"].clone()).unwrap()
}

#[tokio::test]
async fn test_result_lookup() {
    let app = test_app(2);
    let saved = generate_one(&app).await;

    let response = app
        .router
        .oneshot(get_request(&format!("/api/results/{}", saved.id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let fetched: PhotoResult = serde_json::from_value(json).unwrap();
    assert_eq!(fetched, saved);
}

#[tokio::test]
async fn test_result_not_found() {
    let app = test_app(2);

    for uri in ["/api/results/AAAAAAAAAA", "/api/results/not-an-id!"] {
        let response = app.router.clone().oneshot(get_request(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert_eq!(json["error"], "not_found");
    }
}

#[tokio::test]
async fn test_share_page() {
    let app = test_app(2);
    let saved = generate_one(&app).await;

    let response = app
        .router
        .oneshot(get_request(&format!("/result/{}", saved.id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/html"));

    let html = text_body(response).await;
    assert!(html.contains(&format!(
        r#"<meta property="og:image" content="{}">"#,
        saved.generated_url
    )));
    assert!(html.contains(&format!("{}/result/{}", TEST_PUBLIC_URL, saved.id)));
    assert!(html.contains(&saved.original_url));
}

#[tokio::test]
async fn test_share_page_not_found() {
    let app = test_app(2);

    let response = app
        .router
        .oneshot(get_request("/result/AAAAAAAAAA"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let html = text_body(response).await;
    assert!(html.contains("<html"));
}

#[tokio::test]
async fn test_blob_serving() {
    let app = test_app(2);
    let saved = generate_one(&app).await;
    let path = saved
        .generated_url
        .strip_prefix(TEST_PUBLIC_URL)
        .unwrap()
        .to_string();

    let response = app.router.clone().oneshot(get_request(&path)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.as_ref(), app.backend.output());

    let missing = app
        .router
        .oneshot(get_request("/blobs/christmas/nope/original"))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
