// ABOUTME: TikTok inbox upload tests against a mocked content posting API
// ABOUTME: Covers init request shape, chunk headers, TikTok errors and the upload route
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use chrono::{Duration, Utc};
use common::{body_json, send};
use idlink::errors::ErrorCode;
use idlink::models::{AuthProvider, ProviderTokens};
use idlink::resources::ServerResources;
use idlink::services::TikTokUploadService;
use idlink::utils::http_client::upload_client;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header as header_matcher, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INIT_PATH: &str = "/tiktok-api/v2/post/publish/inbox/video/init/";
const BOUNDARY: &str = "idlink-upload-boundary";

async fn mock_init(server: &MockServer, size: u64) {
    Mock::given(method("POST"))
        .and(path(INIT_PATH))
        .and(header_matcher("authorization", "Bearer tt-access"))
        .and(body_partial_json(json!({
            "source_info": {
                "source": "FILE_UPLOAD",
                "video_size": size,
                "chunk_size": size,
                "total_chunk_count": 1
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "publish_id": "v_inbox_file~v2.123",
                "upload_url": format!("{}/upload/abc", server.uri())
            },
            "error": { "code": "ok", "message": "", "log_id": "log-1" }
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mock_put(server: &MockServer, range: &str, status: u16) {
    Mock::given(method("PUT"))
        .and(path("/upload/abc"))
        .and(header_matcher("content-type", "video/mp4"))
        .and(header_matcher("content-range", range))
        .respond_with(ResponseTemplate::new(status))
        .expect(1)
        .mount(server)
        .await;
}

fn service(server: &MockServer) -> TikTokUploadService {
    TikTokUploadService::new(upload_client(), &format!("{}/tiktok-api/", server.uri()))
}

#[tokio::test]
async fn test_upload_to_inbox_returns_publish_id() {
    let server = MockServer::start().await;
    mock_init(&server, 5).await;
    mock_put(&server, "bytes 0-4/5", 201).await;

    let publish_id = service(&server)
        .upload_to_inbox("tt-access", Bytes::from_static(b"video"), "video/mp4")
        .await
        .unwrap();
    assert_eq!(publish_id, "v_inbox_file~v2.123");
}

#[tokio::test]
async fn test_init_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INIT_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {
                "code": "access_token_invalid",
                "message": "The access token is invalid or not found in the request."
            }
        })))
        .mount(&server)
        .await;

    let error = service(&server)
        .upload_to_inbox("tt-access", Bytes::from_static(b"video"), "video/mp4")
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::ExternalServiceError);
    assert!(error.message.contains("access_token_invalid"));
}

#[tokio::test]
async fn test_rejected_chunk_fails_upload() {
    let server = MockServer::start().await;
    mock_init(&server, 5).await;
    mock_put(&server, "bytes 0-4/5", 500).await;

    let error = service(&server)
        .upload_to_inbox("tt-access", Bytes::from_static(b"video"), "video/mp4")
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::ExternalServiceError);
}

#[tokio::test]
async fn test_empty_video_never_reaches_tiktok() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let error = service(&server)
        .upload_to_inbox("tt-access", Bytes::new(), "video/mp4")
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::InvalidInput);
}

/// Cookie header for a user with a valid TikTok token
async fn tiktok_session(resources: &ServerResources) -> String {
    let user = common::create_linked_user(
        &resources.database,
        &format!("{}@tiktok.user", common::random_subject()),
        AuthProvider::Tiktok,
        &common::random_subject(),
        Some(ProviderTokens {
            access_token: "tt-access".to_owned(),
            refresh_token: Some("tt-refresh".to_owned()),
            expires_at: Some(Utc::now() + Duration::hours(12)),
        }),
    )
    .await
    .unwrap();
    common::session_cookie_header(resources, &user, AuthProvider::Tiktok)
}

fn multipart_body(video: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(video.len() + 512);
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"video\"; \
             filename=\"clip.mp4\"\r\nContent-Type: video/mp4\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(video);
    body.extend_from_slice(
        format!(
            "\r\n--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nBeach\r\n\
             --{BOUNDARY}--\r\n"
        )
        .as_bytes(),
    );
    body
}

/// POST an upload form, optionally declaring its length up front
async fn post_upload(
    router: &Router,
    cookie: &str,
    body: Vec<u8>,
    with_content_length: bool,
) -> StatusCode {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/tiktok/upload")
        .header(header::COOKIE, cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if with_content_length {
        builder = builder.header(header::CONTENT_LENGTH, body.len());
    }
    send(router, builder.body(Body::from(body)).unwrap())
        .await
        .status()
}

fn upload_limit(resources: &Arc<ServerResources>) -> usize {
    resources.config.max_upload_bytes
}

#[tokio::test]
async fn test_upload_route_end_to_end() {
    let server = MockServer::start().await;
    mock_init(&server, 10).await;
    mock_put(&server, "bytes 0-9/10", 200).await;
    let (resources, router) = common::create_mock_app(&server.uri()).await.unwrap();
    let cookie = tiktok_session(&resources).await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/tiktok/upload")
        .header(header::COOKIE, cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(b"0123456789")))
        .unwrap();

    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["publish_id"], "v_inbox_file~v2.123");
    assert!(json["message"].as_str().unwrap().contains("inbox"));
}

#[tokio::test]
async fn test_video_at_size_limit_is_accepted() {
    let server = MockServer::start().await;
    let (resources, router) = common::create_mock_app(&server.uri()).await.unwrap();
    let limit = upload_limit(&resources);
    mock_init(&server, u64::try_from(limit).unwrap()).await;
    mock_put(&server, &format!("bytes 0-{}/{limit}", limit - 1), 201).await;
    let cookie = tiktok_session(&resources).await;

    let status = post_upload(&router, &cookie, multipart_body(&vec![7u8; limit]), true).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_video_one_byte_over_limit_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let (resources, router) = common::create_mock_app(&server.uri()).await.unwrap();
    let limit = upload_limit(&resources);
    let cookie = tiktok_session(&resources).await;

    let status = post_upload(&router, &cookie, multipart_body(&vec![7u8; limit + 1]), true).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_oversized_upload_is_rejected_with_or_without_content_length() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let (resources, router) = common::create_mock_app(&server.uri()).await.unwrap();
    let video = vec![7u8; upload_limit(&resources) * 2];
    let cookie = tiktok_session(&resources).await;

    // Without Content-Length the body is cut off while the form is streamed
    let streamed = post_upload(&router, &cookie, multipart_body(&video), false).await;
    assert_eq!(streamed, StatusCode::PAYLOAD_TOO_LARGE);

    let declared = post_upload(&router, &cookie, multipart_body(&video), true).await;
    assert_eq!(declared, StatusCode::PAYLOAD_TOO_LARGE);
}
