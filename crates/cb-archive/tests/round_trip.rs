//! Export and restore against a real SQLite repository and a disk store.

use std::io::Cursor;

use cb_archive::{export_board, ArchiveError, BoardLocks, BoardRestorer, RestoreMode, RestoreOptions};
use cb_core::models::{BoardType, NewAttachment, NewPost};
use cb_core::traits::{BoardRepo, MediaStore};
use cb_db_sqlite::SqliteBoardRepo;
use cb_storage_local::LocalMediaStore;
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

struct Site {
    repo: SqliteBoardRepo,
    store: LocalMediaStore,
    author: i64,
    _root: TempDir,
}

impl Site {
    async fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let repo = SqliteBoardRepo::new("sqlite::memory:").await.unwrap();
        let author = repo.ensure_user("admin@example.org", "admin").await.unwrap();
        let store = LocalMediaStore::new(root.path().to_path_buf(), "uploads");
        Self { repo, store, author, _root: root }
    }

    async fn post(&self, board: &BoardType, title: &str, day: u32, files: &[(&str, &[u8])]) -> i64 {
        let at = Utc.with_ymd_and_hms(2024, 3, day, 9, 30, 0).unwrap();
        let id = self
            .repo
            .create_post(NewPost {
                board_type: board.clone(),
                title: title.into(),
                content: format!("<p>{title}</p>"),
                author_id: self.author,
                author_name: Some("김집사".into()),
                category: Some("행사".into()),
                view_count: 7,
                is_notice: false,
                created_at: at,
                updated_at: at,
            })
            .await
            .unwrap();
        for (name, data) in files {
            let file_url = self.store.save_upload("gallery", name, data).await.unwrap();
            self.repo
                .create_attachment(NewAttachment {
                    post_id: id,
                    file_name: name.to_string(),
                    file_url,
                    file_size: data.len() as i64,
                    mime_type: "image/jpeg".into(),
                })
                .await
                .unwrap();
        }
        id
    }

    async fn export(&self, board: &BoardType) -> Cursor<Vec<u8>> {
        let (mut sink, _) = export_board(&self.repo, &self.store, board, Cursor::new(Vec::new())).await.unwrap();
        sink.set_position(0);
        sink
    }

    fn options(&self, board: &BoardType, mode: RestoreMode) -> RestoreOptions {
        RestoreOptions { board_type: board.clone(), mode, author_id: self.author }
    }
}

fn gallery() -> BoardType {
    "GALLERY".parse().unwrap()
}

#[tokio::test]
async fn test_export_then_restore_into_empty_site() {
    let source = Site::new().await;
    let board = gallery();
    source.post(&board, "Easter", 31, &[("a.jpg", &b"aaaa"[..]), ("b.jpg", &b"bb"[..])]).await;
    source.post(&board, "Retreat", 2, &[]).await;
    source.repo.upsert_board_settings(&board, &serde_json::json!({"layout": "grid"})).await.unwrap();

    let archive = source.export(&board).await;

    let target = Site::new().await;
    let locks = BoardLocks::new();
    let report = BoardRestorer::new(&target.repo, &target.store, &locks)
        .restore(archive, &target.options(&board, RestoreMode::Merge))
        .await
        .unwrap();
    assert_eq!((report.imported, report.skipped, report.failed), (2, 0, 0));
    assert_eq!(report.attachments, 2);

    let posts = target.repo.list_posts(&board).await.unwrap();
    let easter = posts.iter().find(|p| p.post.title == "Easter").unwrap();
    assert_eq!(easter.post.author_name.as_deref(), Some("김집사"));
    assert_eq!(easter.post.view_count, 7);
    assert_eq!(easter.post.created_at, Utc.with_ymd_and_hms(2024, 3, 31, 9, 30, 0).unwrap());
    let mut restored_files: Vec<_> =
        easter.attachments.iter().map(|a| (a.file_name.as_str(), a.file_size, a.mime_type.as_str())).collect();
    restored_files.sort();
    assert_eq!(restored_files, vec![("a.jpg", 4, "image/jpeg"), ("b.jpg", 2, "image/jpeg")]);
    let restored = target.store.read(&easter.attachments[0].file_url).await.unwrap();
    assert_eq!(restored.as_deref(), Some(&b"aaaa"[..]));

    let settings = target.repo.get_board_settings(&board).await.unwrap();
    assert_eq!(settings, Some(serde_json::json!({"layout": "grid"})));
}

#[tokio::test]
async fn test_merging_the_same_archive_twice_skips_everything() {
    let site = Site::new().await;
    let board = gallery();
    site.post(&board, "Easter", 31, &[("a.jpg", &b"aaaa"[..])]).await;
    site.post(&board, "Retreat", 2, &[]).await;

    let locks = BoardLocks::new();
    let restorer = BoardRestorer::new(&site.repo, &site.store, &locks);
    let report = restorer.restore(site.export(&board).await, &site.options(&board, RestoreMode::Merge)).await.unwrap();

    assert_eq!((report.imported, report.skipped, report.failed), (0, 2, 0));
    assert_eq!(site.repo.count_posts(&board).await.unwrap(), 2);
}

#[tokio::test]
async fn test_overwrite_leaves_exactly_the_archived_posts() {
    let site = Site::new().await;
    let board = gallery();
    site.post(&board, "Easter", 31, &[("a.jpg", &b"aaaa"[..])]).await;
    let archive = site.export(&board).await;

    site.post(&board, "Added later", 5, &[("late.jpg", &b"late"[..])]).await;
    let posts = site.repo.list_posts(&board).await.unwrap();
    let late = posts.iter().find(|p| p.post.title == "Added later").unwrap();
    let late_url = late.attachments[0].file_url.clone();

    let locks = BoardLocks::new();
    let report = BoardRestorer::new(&site.repo, &site.store, &locks)
        .restore(archive, &site.options(&board, RestoreMode::Overwrite))
        .await
        .unwrap();
    assert_eq!(report.purged, 2);
    assert_eq!(report.imported, 1);

    let posts = site.repo.list_posts(&board).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].post.title, "Easter");
    assert_eq!(site.store.read(&late_url).await.unwrap(), None);
}

#[tokio::test]
async fn test_missing_file_is_reported_not_fatal() {
    let site = Site::new().await;
    let board = gallery();
    site.post(&board, "Easter", 31, &[("a.jpg", &b"aaaa"[..]), ("b.jpg", &b"bb"[..])]).await;
    let gone = site.repo.list_posts(&board).await.unwrap()[0].attachments[1].file_url.clone();
    site.store.delete(&gone).await.unwrap();

    let (mut sink, summary) = export_board(&site.repo, &site.store, &board, Cursor::new(Vec::new())).await.unwrap();
    assert_eq!((summary.posts, summary.files, summary.missing_files), (1, 1, 1));
    sink.set_position(0);

    let target = Site::new().await;
    let locks = BoardLocks::new();
    let report = BoardRestorer::new(&target.repo, &target.store, &locks)
        .restore(sink, &target.options(&board, RestoreMode::Merge))
        .await
        .unwrap();
    assert_eq!(report.imported, 1);
    assert_eq!(report.attachments, 1);
    assert_eq!(report.missing_files, 1);
}

#[tokio::test]
async fn test_archive_of_another_board_changes_nothing() {
    let site = Site::new().await;
    let board = gallery();
    let notice: BoardType = "NOTICE".parse().unwrap();
    site.post(&board, "Easter", 31, &[]).await;
    site.post(&notice, "Service times", 1, &[]).await;

    let archive = site.export(&board).await;
    let locks = BoardLocks::new();
    let result = BoardRestorer::new(&site.repo, &site.store, &locks)
        .restore(archive, &site.options(&notice, RestoreMode::Overwrite))
        .await;

    assert!(matches!(result, Err(ArchiveError::TypeMismatch { .. })));
    assert_eq!(site.repo.count_posts(&notice).await.unwrap(), 1);
    assert_eq!(site.repo.count_posts(&board).await.unwrap(), 1);
}
