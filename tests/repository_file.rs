mod common;

use std::sync::Arc;

use shorturl::domain::entities::{DeleteOutcome, NewShortUrl};
use shorturl::domain::repositories::ShortUrlRepository;
use shorturl::infrastructure::persistence::FileRepository;
use uuid::Uuid;

async fn open(path: &std::path::Path) -> FileRepository {
    FileRepository::open(path, common::create_codec()).await.unwrap()
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("urls.log");
    let owner = Uuid::new_v4();

    let saved = {
        let repo = open(&path).await;
        repo.save(NewShortUrl::new(owner, "https://example.com/"))
            .await
            .unwrap()
            .into_record()
    };

    let repo = open(&path).await;
    let found = repo.find_by_code(&saved.code).await.unwrap();
    let again = repo
        .save(NewShortUrl::new(owner, "https://example.com/"))
        .await
        .unwrap();

    assert_eq!(found.as_ref(), Some(&saved));
    assert!(again.is_duplicate());
    assert_eq!(again.record(), &saved);
}

#[tokio::test]
async fn test_soft_delete_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("urls.log");
    let owner = Uuid::new_v4();

    let record = {
        let repo = open(&path).await;
        let record = repo
            .save(NewShortUrl::new(owner, "https://example.com/"))
            .await
            .unwrap()
            .into_record();
        let outcome = repo.batch_soft_delete(&[record.clone()]).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted(1));
        record
    };

    let repo = open(&path).await;
    let found = repo.find_by_code(&record.code).await.unwrap().unwrap();

    assert!(found.deleted);
    assert_eq!(repo.find_all_by_owner(&owner).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_ids_continue_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("urls.log");
    let owner = Uuid::new_v4();

    let first = {
        let repo = open(&path).await;
        repo.batch_save(vec![
            NewShortUrl::new(owner, "https://a/"),
            NewShortUrl::new(owner, "https://b/"),
        ])
        .await
        .unwrap()
    };

    let repo = open(&path).await;
    let third = repo
        .save(NewShortUrl::new(owner, "https://c/"))
        .await
        .unwrap()
        .into_record();

    assert_eq!(first[1].record().id, 2);
    assert_eq!(third.id, 3);
    assert!(first.iter().all(|saved| saved.record().code != third.code));
}

#[tokio::test]
async fn test_torn_tail_is_ignored_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("urls.log");
    let owner = Uuid::new_v4();

    let saved = {
        let repo = open(&path).await;
        repo.save(NewShortUrl::new(owner, "https://example.com/"))
            .await
            .unwrap()
            .into_record()
    };

    let mut content = std::fs::read_to_string(&path).unwrap();
    content.push_str("{\"id\":2,\"co");
    std::fs::write(&path, content).unwrap();

    let repo = open(&path).await;
    let next = repo
        .save(NewShortUrl::new(owner, "https://next/"))
        .await
        .unwrap()
        .into_record();

    assert_eq!(repo.find_by_code(&saved.code).await.unwrap(), Some(saved));
    assert_eq!(next.id, 2);

    let reopened = open(&path).await;
    assert_eq!(reopened.find_by_code(&next.code).await.unwrap(), Some(next));
}

#[tokio::test]
async fn test_corrupt_log_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("urls.log");
    std::fs::write(&path, "garbage\n{\"also\":\"bad\"}\n").unwrap();

    let result = FileRepository::open(&path, common::create_codec()).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_shared_across_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Arc::new(open(&dir.path().join("urls.log")).await);
    let owner = Uuid::new_v4();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move {
                repo.save(NewShortUrl::new(owner, format!("https://example.com/{i}")))
                    .await
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(repo.find_all_by_owner(&owner).await.unwrap().len(), 8);
}

#[tokio::test]
async fn test_fragment_of_failed_write_is_cut_before_next_append() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("urls.log");
    let owner = Uuid::new_v4();

    let (first, second) = {
        let repo = open(&path).await;
        let first = repo
            .save(NewShortUrl::new(owner, "https://example.com/a"))
            .await
            .unwrap()
            .into_record();

        // What a write interrupted by a full disk leaves behind.
        let mut log = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        std::io::Write::write_all(&mut log, br#"{"id":2,"co"#).unwrap();

        let second = repo
            .save(NewShortUrl::new(owner, "https://example.com/b"))
            .await
            .unwrap()
            .into_record();
        (first, second)
    };

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(!content.contains(r#"{"id":2,"co{"#));

    let repo = open(&path).await;
    assert_eq!(repo.find_by_code(&first.code).await.unwrap(), Some(first));
    assert_eq!(repo.find_by_code(&second.code).await.unwrap(), Some(second));
}
