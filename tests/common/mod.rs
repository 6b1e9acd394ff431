#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum_test::{TestResponse, TestServer};
use shorturl::application::services::{AuthService, LinkService};
use shorturl::domain::deletion_event::DeletionSettings;
use shorturl::domain::deletion_worker::DeletionPipeline;
use shorturl::domain::repositories::ShortUrlRepository;
use shorturl::infrastructure::persistence::MemoryRepository;
use shorturl::routes;
use shorturl::state::AppState;
use shorturl::utils::uid_codec::{UidCodec, UidStrategy};

pub const TEST_SALT: &str = "integration test salt";
pub const TEST_BASE_URL: &str = "http://short.test";
pub const TEST_SIGNATURE_KEY: &str = "test-signature-key";
pub const TEST_COMPRESSION_LEVEL: u32 = 5;

pub fn create_codec() -> Arc<UidCodec> {
    Arc::new(UidCodec::new(TEST_SALT, 5, UidStrategy::Sequential).unwrap())
}

pub struct TestApp {
    pub state: AppState,
    pub repository: Arc<MemoryRepository>,
    pub pipeline: Arc<DeletionPipeline>,
    pub codec: Arc<UidCodec>,
}

/// Memory-backed application; must be called inside a Tokio runtime.
pub fn create_test_app() -> TestApp {
    let codec = create_codec();
    let repository = Arc::new(MemoryRepository::new(Arc::clone(&codec)));
    let shared: Arc<dyn ShortUrlRepository> = repository.clone();

    let pipeline = Arc::new(DeletionPipeline::start(
        Arc::clone(&shared),
        Arc::clone(&codec),
        DeletionSettings::new(100, Duration::from_secs(60)),
    ));

    let link_service = Arc::new(LinkService::new(
        shared,
        Arc::clone(&codec),
        Arc::clone(&pipeline),
        TEST_BASE_URL,
    ));
    let auth_service = Arc::new(AuthService::new(TEST_SIGNATURE_KEY).unwrap());

    TestApp {
        state: AppState::new(link_service, auth_service),
        repository,
        pipeline,
        codec,
    }
}

pub fn create_test_server(app: &TestApp) -> TestServer {
    TestServer::new(routes::router(app.state.clone(), TEST_COMPRESSION_LEVEL)).unwrap()
}

/// `name=value` part of the owner cookie set by `response`.
pub fn owner_cookie(response: &TestResponse) -> String {
    let header = response.header("set-cookie");
    let value = header.to_str().unwrap();
    value.split(';').next().unwrap().trim().to_string()
}

/// Code at the end of a short URL.
pub fn code_of(short_url: &str) -> String {
    short_url.rsplit('/').next().unwrap().to_string()
}

/// Flushes the pipeline until `code` is deleted or a second passes.
pub async fn wait_until_deleted(app: &TestApp, code: &str) -> bool {
    for _ in 0..100 {
        app.pipeline.flush().await;
        let record = app.repository.find_by_code(code).await.unwrap();
        if record.is_some_and(|record| record.deleted) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Wraps `data` in a gzip member holding one stored (uncompressed) deflate block.
pub fn gzip_stored(data: &[u8]) -> Vec<u8> {
    let len = u16::try_from(data.len()).unwrap();
    let mut out = vec![0x1f, 0x8b, 0x08, 0x00, 0, 0, 0, 0, 0x00, 0xff];
    out.push(0x01);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&(!len).to_le_bytes());
    out.extend_from_slice(data);
    out.extend_from_slice(&crc32(data).to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xffff_ffffu32;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xedb8_8320 & mask);
        }
    }
    !crc
}
