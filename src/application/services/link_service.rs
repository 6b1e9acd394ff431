//! Short URL creation, lookup and deletion service.

use std::sync::Arc;

use serde_json::json;
use tokio::task::JoinHandle;
use url::Url;

use crate::domain::deletion_worker::DeletionPipeline;
use crate::domain::entities::{NewShortUrl, OwnerId, Saved, ShortUrl};
use crate::domain::repositories::ShortUrlRepository;
use crate::error::AppError;
use crate::utils::uid_codec::UidCodec;

/// Service sitting between HTTP handlers and the storage core.
///
/// Validates input, maps storage outcomes to [`AppError`] and builds the
/// public short URL for a code.
pub struct LinkService {
    repository: Arc<dyn ShortUrlRepository>,
    codec: Arc<UidCodec>,
    pipeline: Arc<DeletionPipeline>,
    base_url: String,
}

impl LinkService {
    pub fn new(
        repository: Arc<dyn ShortUrlRepository>,
        codec: Arc<UidCodec>,
        pipeline: Arc<DeletionPipeline>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            codec,
            pipeline,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Stores `original_url` for `owner_id`.
    ///
    /// Shortening the same URL twice returns the first record as
    /// [`Saved::Duplicate`].
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if the URL is not absolute.
    /// Returns [`AppError::Internal`] on storage errors.
    pub async fn shorten(&self, owner_id: OwnerId, original_url: &str) -> Result<Saved, AppError> {
        let original_url = validate_url(original_url)?;

        Ok(self
            .repository
            .save(NewShortUrl::new(owner_id, original_url))
            .await?)
    }

    /// Stores several URLs at once; results keep the order of `urls`.
    ///
    /// Every URL is validated before anything is stored, so one bad URL
    /// rejects the whole batch.
    pub async fn shorten_batch(
        &self,
        owner_id: OwnerId,
        urls: Vec<String>,
    ) -> Result<Vec<Saved>, AppError> {
        if urls.is_empty() {
            return Err(AppError::bad_request("Batch is empty", json!({})));
        }

        let new_urls = urls
            .iter()
            .map(|url| validate_url(url).map(|url| NewShortUrl::new(owner_id, url)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self.repository.batch_save(new_urls).await?)
    }

    /// Looks up the record a redirect should follow.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] for a malformed code
    /// - [`AppError::NotFound`] for an unknown code
    /// - [`AppError::Gone`] for a deleted record
    pub async fn resolve(&self, code: &str) -> Result<ShortUrl, AppError> {
        if !self.codec.is_valid(code) {
            return Err(AppError::bad_request(
                "Malformed short code",
                json!({ "code": code, "pattern": self.codec.pattern() }),
            ));
        }

        let record = self
            .repository
            .find_by_code(code)
            .await?
            .ok_or_else(|| AppError::not_found("Short URL not found", json!({ "code": code })))?;

        if record.is_deleted() {
            return Err(AppError::gone(
                "Short URL was deleted",
                json!({ "code": code }),
            ));
        }

        Ok(record)
    }

    /// All records of `owner_id`, deleted ones included, in creation order.
    pub async fn list_for_owner(&self, owner_id: &OwnerId) -> Result<Vec<ShortUrl>, AppError> {
        Ok(self.repository.find_all_by_owner(owner_id).await?)
    }

    /// Hands `codes` to the deletion pipeline without waiting for the result.
    pub fn delete(&self, owner_id: OwnerId, codes: Vec<String>) -> JoinHandle<()> {
        self.pipeline.push(codes, owner_id)
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        Ok(self.repository.ping().await?)
    }

    /// Public URL for `code`, e.g. `http://localhost:8080/abcde`.
    pub fn short_url(&self, code: &str) -> String {
        format!("{}/{}", self.base_url, code)
    }
}

/// Accepts absolute URLs with a host; returns the trimmed input unchanged.
fn validate_url(raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim();

    let parsed = Url::parse(trimmed).map_err(|e| {
        AppError::bad_request(
            "Invalid URL format",
            json!({ "url": raw, "reason": e.to_string() }),
        )
    })?;

    if !parsed.has_host() {
        return Err(AppError::bad_request(
            "Invalid URL format",
            json!({ "url": raw, "reason": "URL has no host" }),
        ));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::deletion_event::DeletionSettings;
    use crate::domain::repositories::{MockShortUrlRepository, Operation, StoreError};
    use crate::utils::uid_codec::UidStrategy;
    use uuid::Uuid;

    fn service(mock: MockShortUrlRepository) -> LinkService {
        let codec = Arc::new(UidCodec::new("service salt", 5, UidStrategy::Sequential).unwrap());
        let repository: Arc<dyn ShortUrlRepository> = Arc::new(mock);
        let pipeline = Arc::new(DeletionPipeline::start(
            Arc::clone(&repository),
            Arc::clone(&codec),
            DeletionSettings::default(),
        ));

        LinkService::new(repository, codec, pipeline, "http://localhost:8080/")
    }

    fn record(code: &str, deleted: bool) -> ShortUrl {
        ShortUrl {
            deleted,
            ..ShortUrl::new(
                1,
                code.to_string(),
                "https://example.com/".to_string(),
                Uuid::nil(),
            )
        }
    }

    #[tokio::test]
    async fn test_shorten_rejects_relative_url() {
        let mut mock = MockShortUrlRepository::new();
        mock.expect_save().never();

        let result = service(mock).shorten(Uuid::new_v4(), "/just/a/path").await;

        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_shorten_trims_and_saves() {
        let owner = Uuid::new_v4();
        let mut mock = MockShortUrlRepository::new();
        mock.expect_save()
            .withf(move |new_url| {
                new_url.owner_id == owner && new_url.original_url == "https://example.com/"
            })
            .times(1)
            .returning(|new_url| {
                Ok(Saved::Created(ShortUrl::new(
                    1,
                    "abcde".to_string(),
                    new_url.original_url,
                    new_url.owner_id,
                )))
            });

        let saved = service(mock)
            .shorten(owner, "  https://example.com/\n")
            .await
            .unwrap();

        assert!(!saved.is_duplicate());
    }

    #[tokio::test]
    async fn test_batch_with_one_invalid_url_stores_nothing() {
        let mut mock = MockShortUrlRepository::new();
        mock.expect_batch_save().never();

        let result = service(mock)
            .shorten_batch(
                Uuid::new_v4(),
                vec!["https://ok.example/".to_string(), "nope".to_string()],
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_resolve_malformed_code_skips_storage() {
        let mut mock = MockShortUrlRepository::new();
        mock.expect_find_by_code().never();

        let result = service(mock).resolve("bad code!").await;

        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_resolve_unknown_code_is_not_found() {
        let mut mock = MockShortUrlRepository::new();
        mock.expect_find_by_code().returning(|_| Ok(None));

        let result = service(mock).resolve("abcdef").await;

        assert!(matches!(result, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_resolve_deleted_code_is_gone() {
        let mut mock = MockShortUrlRepository::new();
        mock.expect_find_by_code()
            .returning(|code| Ok(Some(record(code, true))));

        let result = service(mock).resolve("abcdef").await;

        assert!(matches!(result, Err(AppError::Gone { .. })));
    }

    #[tokio::test]
    async fn test_resolve_live_code() {
        let mut mock = MockShortUrlRepository::new();
        mock.expect_find_by_code()
            .returning(|code| Ok(Some(record(code, false))));

        let found = service(mock).resolve("abcdef").await.unwrap();

        assert_eq!(found.original_url, "https://example.com/");
    }

    #[tokio::test]
    async fn test_storage_error_is_internal() {
        let mut mock = MockShortUrlRepository::new();
        mock.expect_find_all_by_owner()
            .returning(|_| Err(StoreError::Timeout { op: Operation::Find }));

        let result = service(mock).list_for_owner(&Uuid::new_v4()).await;

        assert!(matches!(result, Err(AppError::Internal { .. })));
    }

    #[tokio::test]
    async fn test_short_url_joins_base() {
        let service = service(MockShortUrlRepository::new());

        assert_eq!(service.short_url("abcde"), "http://localhost:8080/abcde");
    }
}
