mod common;

use axum::http::StatusCode;
use shorturl::domain::repositories::ShortUrlRepository;

#[tokio::test]
async fn test_list_is_gzipped_when_client_accepts_it() {
    let app = common::create_test_app();
    let server = common::create_test_server(&app);

    let created = server.post("/").text("https://example.com/a/long/enough/path").await;
    let cookie = common::owner_cookie(&created);

    let response = server
        .get("/api/user/urls")
        .add_header("cookie", cookie)
        .add_header("accept-encoding", "gzip")
        .await;

    response.assert_status_ok();
    assert_eq!(response.header("content-encoding"), "gzip");
    assert_eq!(&response.as_bytes()[..2], &[0x1f, 0x8b]);
}

#[tokio::test]
async fn test_plain_response_without_accept_encoding() {
    let app = common::create_test_app();
    let server = common::create_test_server(&app);

    let created = server.post("/").text("https://example.com/a/long/enough/path").await;
    let cookie = common::owner_cookie(&created);

    let response = server
        .get("/api/user/urls")
        .add_header("cookie", cookie)
        .await;

    response.assert_status_ok();
    assert!(response.headers().get("content-encoding").is_none());
}

#[tokio::test]
async fn test_gzipped_request_body_is_inflated() {
    let app = common::create_test_app();
    let server = common::create_test_server(&app);
    let body = common::gzip_stored(b"https://example.com/gzipped");

    let response = server
        .post("/")
        .add_header("content-type", "text/plain")
        .add_header("content-encoding", "gzip")
        .bytes(body.into())
        .await;

    response.assert_status(StatusCode::CREATED);
    let code = common::code_of(&response.text());
    let record = app.repository.find_by_code(&code).await.unwrap().unwrap();
    assert_eq!(record.original_url, "https://example.com/gzipped");
}

#[tokio::test]
async fn test_unsupported_request_encoding_is_rejected() {
    let app = common::create_test_app();
    let server = common::create_test_server(&app);

    let response = server
        .post("/")
        .add_header("content-type", "text/plain")
        .add_header("content-encoding", "br")
        .bytes(b"https://example.com/".to_vec().into())
        .await;

    response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
}
