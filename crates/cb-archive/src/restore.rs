//! Restoring a board from an archive in merge or overwrite mode.

use std::fmt;
use std::io::{Read, Seek};
use std::str::FromStr;

use cb_core::error::AppError;
use cb_core::models::{BoardType, NewAttachment, NewPost};
use cb_core::traits::{BoardRepo, MediaStore};
use serde::Serialize;

use crate::error::ArchiveError;
use crate::lock::BoardLocks;
use crate::metadata::ArchivedPost;
use crate::reader::{open_archive, ArchiveFiles};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestoreMode {
    /// Add archived posts, skipping those already present (same title and
    /// creation time).
    #[default]
    Merge,
    /// Delete every post of the board, and their files, before inserting.
    Overwrite,
}

impl FromStr for RestoreMode {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "merge" => Ok(Self::Merge),
            "overwrite" => Ok(Self::Overwrite),
            other => Err(AppError::ValidationError(format!(
                "unknown restore mode {other:?}, expected \"merge\" or \"overwrite\""
            ))),
        }
    }
}

impl fmt::Display for RestoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Merge => "merge",
            Self::Overwrite => "overwrite",
        })
    }
}

#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub board_type: BoardType,
    pub mode: RestoreMode,
    /// Account that will own every restored post
    pub author_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Posts deleted up front in overwrite mode
    pub purged: u64,
    pub attachments: usize,
    /// Attachments whose file entry was absent from the archive
    pub missing_files: usize,
}

/// Outcome of one restored post.
struct RestoredPost {
    attachments: usize,
    missing_files: usize,
}

pub struct BoardRestorer<'a> {
    repo: &'a dyn BoardRepo,
    store: &'a dyn MediaStore,
    locks: &'a BoardLocks,
}

impl<'a> BoardRestorer<'a> {
    pub fn new(repo: &'a dyn BoardRepo, store: &'a dyn MediaStore, locks: &'a BoardLocks) -> Self {
        Self { repo, store, locks }
    }

    /// Restores `archive` into the board named in `options`.
    ///
    /// The archive is fully validated before anything is touched. After
    /// that, each post together with its attachments is restored as one
    /// unit: a failure undoes that post and the run moves on.
    pub async fn restore<R: Read + Seek>(
        &self,
        archive: R,
        options: &RestoreOptions,
    ) -> Result<RestoreReport, ArchiveError> {
        let board = &options.board_type;
        let opened = open_archive(archive, board)?;
        let (metadata, mut files) = (opened.metadata, opened.files);

        let _guard = self.locks.acquire(board).await;
        log::info!(
            "restoring {} posts into {board} ({} mode)",
            metadata.posts.len(),
            options.mode
        );

        let mut report = RestoreReport::default();
        if options.mode == RestoreMode::Overwrite {
            report.purged = self.purge(board).await?;
        }

        if let Some(settings) = &metadata.settings {
            self.repo
                .upsert_board_settings(board, settings)
                .await
                .map_err(ArchiveError::Storage)?;
        }

        let folder = board.as_str().to_ascii_lowercase();
        for post in &metadata.posts {
            if options.mode == RestoreMode::Merge {
                match self.already_present(board, post).await {
                    Ok(true) => {
                        report.skipped += 1;
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        log::warn!("{board} restore: duplicate check failed for {:?}: {e:#}", post.title);
                        report.failed += 1;
                        continue;
                    }
                }
            }

            match self.restore_post(&mut files, post, options, &folder).await {
                Ok(restored) => {
                    report.imported += 1;
                    report.attachments += restored.attachments;
                    report.missing_files += restored.missing_files;
                }
                Err(e) => {
                    log::warn!("{board} restore: post {:?} failed: {e:#}", post.title);
                    report.failed += 1;
                }
            }
        }

        log::info!(
            "{board} restore finished: {} imported, {} skipped, {} failed, {} attachments",
            report.imported,
            report.skipped,
            report.failed,
            report.attachments
        );
        Ok(report)
    }

    /// Deletes every post of the board. Files go first and only on a best
    /// effort basis; the row deletion is what must succeed.
    async fn purge(&self, board: &BoardType) -> Result<u64, ArchiveError> {
        let existing = self.repo.list_posts(board).await.map_err(ArchiveError::Storage)?;
        for attachment in existing.iter().flat_map(|p| &p.attachments) {
            if let Err(e) = self.store.delete(&attachment.file_url).await {
                log::warn!("{board} restore: could not delete {}: {e:#}", attachment.file_url);
            }
        }
        let purged = self.repo.delete_posts_by_board(board).await.map_err(ArchiveError::Storage)?;
        log::info!("{board} restore: purged {purged} existing posts");
        Ok(purged)
    }

    async fn already_present(&self, board: &BoardType, post: &ArchivedPost) -> anyhow::Result<bool> {
        let same_title = self.repo.find_posts_by_title(board, &post.title).await?;
        Ok(same_title.iter().any(|existing| existing.created_at == post.created_at))
    }

    async fn restore_post<R: Read + Seek>(
        &self,
        files: &mut ArchiveFiles<R>,
        post: &ArchivedPost,
        options: &RestoreOptions,
        folder: &str,
    ) -> anyhow::Result<RestoredPost> {
        let post_id = self
            .repo
            .create_post(NewPost {
                board_type: options.board_type.clone(),
                title: post.title.clone(),
                content: post.content.clone(),
                author_id: options.author_id,
                author_name: post.author_name.clone(),
                category: post.category.clone(),
                view_count: post.view_count,
                is_notice: post.is_notice,
                created_at: post.created_at,
                updated_at: post.created_at,
            })
            .await?;

        let mut written = Vec::new();
        match self.restore_attachments(files, post, post_id, folder, &mut written).await {
            Ok(restored) => Ok(restored),
            Err(e) => {
                self.undo_post(post_id, &written).await;
                Err(e)
            }
        }
    }

    async fn restore_attachments<R: Read + Seek>(
        &self,
        files: &mut ArchiveFiles<R>,
        post: &ArchivedPost,
        post_id: i64,
        folder: &str,
        written: &mut Vec<String>,
    ) -> anyhow::Result<RestoredPost> {
        let mut restored = RestoredPost { attachments: 0, missing_files: 0 };

        for attachment in &post.attachments {
            let Some(data) = files.read(&attachment.backup_path)? else {
                log::warn!("archive has no entry {}, attachment skipped", attachment.backup_path);
                restored.missing_files += 1;
                continue;
            };

            let file_url = self.store.save_upload(folder, &attachment.file_name, &data).await?;
            written.push(file_url.clone());

            let mime_type = if attachment.mime_type.is_empty() {
                mime_guess::from_path(&attachment.file_name).first_or_octet_stream().to_string()
            } else {
                attachment.mime_type.clone()
            };
            self.repo
                .create_attachment(NewAttachment {
                    post_id,
                    file_name: attachment.file_name.clone(),
                    file_url,
                    file_size: i64::try_from(data.len())?,
                    mime_type,
                })
                .await?;
            restored.attachments += 1;
        }

        Ok(restored)
    }

    /// Best-effort removal of a partially restored post and its new files.
    async fn undo_post(&self, post_id: i64, written: &[String]) {
        for file_url in written {
            if let Err(e) = self.store.delete(file_url).await {
                log::warn!("could not remove restored file {file_url}: {e:#}");
            }
        }
        if let Err(e) = self.repo.delete_post(post_id).await {
            log::warn!("could not remove partially restored post {post_id}: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ArchiveMetadata, ArchivedAttachment, METADATA_ENTRY};
    use cb_core::traits::MockBoardRepo;
    use cb_storage_local::LocalMediaStore;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("".parse::<RestoreMode>().unwrap(), RestoreMode::Merge);
        assert_eq!("merge".parse::<RestoreMode>().unwrap(), RestoreMode::Merge);
        assert_eq!("Overwrite".parse::<RestoreMode>().unwrap(), RestoreMode::Overwrite);
        assert!("replace".parse::<RestoreMode>().is_err());
    }

    fn archived(title: &str, attachment: Option<&str>) -> ArchivedPost {
        ArchivedPost {
            title: title.into(),
            content: "c".into(),
            author_name: None,
            view_count: 0,
            is_notice: false,
            category: None,
            created_at: "2020-01-01T00:00:00Z".parse().unwrap(),
            attachments: attachment
                .map(|path| ArchivedAttachment {
                    file_name: "a.txt".into(),
                    backup_path: path.into(),
                    file_size: 3,
                    mime_type: String::new(),
                })
                .into_iter()
                .collect(),
        }
    }

    fn archive_with(posts: Vec<ArchivedPost>, entries: &[&str]) -> Cursor<Vec<u8>> {
        let metadata = ArchiveMetadata {
            exported_at: "2024-01-01T00:00:00Z".parse().unwrap(),
            version: "1.0".into(),
            kind: "NOTICE".into(),
            settings: None,
            post_count: posts.len(),
            posts,
        };
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file(METADATA_ENTRY, SimpleFileOptions::default()).unwrap();
        zip.write_all(&serde_json::to_vec(&metadata).unwrap()).unwrap();
        for entry in entries {
            zip.start_file(*entry, SimpleFileOptions::default()).unwrap();
            zip.write_all(b"abc").unwrap();
        }
        Cursor::new(zip.finish().unwrap().into_inner())
    }

    #[tokio::test]
    async fn test_failed_attachment_undoes_only_its_post() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(root.path().to_path_buf(), "uploads");
        let locks = BoardLocks::new();

        let mut repo = MockBoardRepo::new();
        repo.expect_find_posts_by_title().returning(|_, _| Ok(Vec::new()));
        repo.expect_create_post().times(2).returning(|post| Ok(if post.title == "bad" { 1 } else { 2 }));
        repo.expect_create_attachment().times(2).returning(|attachment| {
            if attachment.post_id == 1 {
                Err(anyhow::anyhow!("disk quota"))
            } else {
                Ok(10)
            }
        });
        repo.expect_delete_post().withf(|id| *id == 1).times(1).returning(|_| Ok(()));

        let archive = archive_with(
            vec![archived("bad", Some("files/uploads/1/a.txt")), archived("good", Some("files/uploads/2/a.txt"))],
            &["files/uploads/1/a.txt", "files/uploads/2/a.txt"],
        );
        let options = RestoreOptions { board_type: "NOTICE".parse().unwrap(), mode: RestoreMode::Merge, author_id: 5 };

        let report = BoardRestorer::new(&repo, &store, &locks).restore(archive, &options).await.unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.attachments, 1);

        // Only the good post's file stays on disk.
        let left: Vec<_> = std::fs::read_dir(root.path().join("uploads/notice")).unwrap().collect();
        assert_eq!(left.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_entry_is_not_a_failure() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(root.path().to_path_buf(), "uploads");
        let locks = BoardLocks::new();

        let mut repo = MockBoardRepo::new();
        repo.expect_find_posts_by_title().returning(|_, _| Ok(Vec::new()));
        repo.expect_create_post().times(1).returning(|_| Ok(1));
        repo.expect_create_attachment().never();

        let archive = archive_with(vec![archived("lossy", Some("files/uploads/1/gone.txt"))], &[]);
        let options = RestoreOptions { board_type: "NOTICE".parse().unwrap(), mode: RestoreMode::Merge, author_id: 5 };

        let report = BoardRestorer::new(&repo, &store, &locks).restore(archive, &options).await.unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(report.missing_files, 1);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn test_wrong_board_touches_nothing() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(root.path().to_path_buf(), "uploads");
        let locks = BoardLocks::new();

        let mut repo = MockBoardRepo::new();
        repo.expect_list_posts().never();
        repo.expect_delete_posts_by_board().never();
        repo.expect_create_post().never();

        let archive = archive_with(vec![archived("x", None)], &[]);
        let options =
            RestoreOptions { board_type: "GALLERY".parse().unwrap(), mode: RestoreMode::Overwrite, author_id: 5 };

        let result = BoardRestorer::new(&repo, &store, &locks).restore(archive, &options).await;
        assert!(matches!(result, Err(ArchiveError::TypeMismatch { .. })));
    }
}
