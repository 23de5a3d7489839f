//! Board snapshot into a zip archive.

use std::collections::HashSet;
use std::io::{Seek, Write};

use cb_core::models::{BoardType, PostWithAttachments};
use cb_core::traits::{BoardRepo, MediaStore};
use chrono::Utc;
use tokio::sync::mpsc;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ArchiveError;
use crate::metadata::{
    sanitize_entry_name, ArchiveMetadata, ArchivedAttachment, ArchivedPost, FILES_PREFIX, FORMAT_VERSION,
    METADATA_ENTRY,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub posts: usize,
    /// Attachment files embedded in the archive
    pub files: usize,
    /// Attachments listed in the metadata whose file could not be read
    pub missing_files: usize,
}

/// A file to embed: archive path and the public URL to read it from.
struct PendingFile {
    backup_path: String,
    file_url: String,
}

/// First free path among `<name>`, `<attachment id>_<name>`, then
/// `<attachment id>_<n>_<name>` for n = 2, 3, ...
fn unique_backup_path(taken: &mut HashSet<String>, post_id: i64, attachment_id: i64, name: &str) -> String {
    let mut candidate = format!("{FILES_PREFIX}/{post_id}/{name}");
    let mut n = 1u32;
    while !taken.insert(candidate.clone()) {
        candidate = if n == 1 {
            format!("{FILES_PREFIX}/{post_id}/{attachment_id}_{name}")
        } else {
            format!("{FILES_PREFIX}/{post_id}/{attachment_id}_{n}_{name}")
        };
        n += 1;
    }
    candidate
}

/// Builds the metadata document and the list of files it references.
///
/// Paths are `files/uploads/<post id>/<file name>`; a name repeated within
/// one post is prefixed with its attachment id to keep paths unique.
fn build_metadata(
    board: &BoardType,
    posts: Vec<PostWithAttachments>,
    settings: Option<serde_json::Value>,
) -> (ArchiveMetadata, Vec<PendingFile>) {
    let mut pending = Vec::new();
    let mut archived_posts = Vec::with_capacity(posts.len());

    for PostWithAttachments { post, attachments } in posts {
        let mut taken = HashSet::new();
        let mut archived_attachments = Vec::with_capacity(attachments.len());

        for attachment in attachments {
            let name = sanitize_entry_name(&attachment.file_name);
            let backup_path = unique_backup_path(&mut taken, post.id, attachment.id, &name);

            pending.push(PendingFile { backup_path: backup_path.clone(), file_url: attachment.file_url });
            archived_attachments.push(ArchivedAttachment {
                file_name: attachment.file_name,
                backup_path,
                file_size: attachment.file_size,
                mime_type: attachment.mime_type,
            });
        }

        archived_posts.push(ArchivedPost {
            title: post.title,
            content: post.content,
            author_name: post.author_name,
            view_count: post.view_count,
            is_notice: post.is_notice,
            category: post.category,
            created_at: post.created_at,
            attachments: archived_attachments,
        });
    }

    let metadata = ArchiveMetadata {
        exported_at: Utc::now(),
        version: FORMAT_VERSION.to_owned(),
        kind: board.to_string(),
        settings,
        post_count: archived_posts.len(),
        posts: archived_posts,
    };
    (metadata, pending)
}

/// Attachment bytes read but not yet written to the archive.
const WRITE_QUEUE: usize = 4;

/// Writes a complete archive of `board` into `sink` and hands the sink back.
///
/// Files are read here and handed over a bounded queue to a blocking task
/// that owns the zip writer, so sink I/O never runs on the async worker.
/// Attachments whose file is missing (or unreadable) stay in the metadata
/// but get no entry; the export still succeeds.
pub async fn export_board<W: Write + Seek + Send + 'static>(
    repo: &dyn BoardRepo,
    store: &dyn MediaStore,
    board: &BoardType,
    sink: W,
) -> Result<(W, ExportSummary), ArchiveError> {
    let posts = repo.list_posts(board).await.map_err(ArchiveError::Storage)?;
    let settings = repo.get_board_settings(board).await.map_err(ArchiveError::Storage)?;

    let (metadata, pending) = build_metadata(board, posts, settings);
    let metadata_json = serde_json::to_vec_pretty(&metadata)?;
    let mut summary = ExportSummary { posts: metadata.post_count, ..ExportSummary::default() };

    let (tx, rx) = mpsc::channel::<(String, Vec<u8>)>(WRITE_QUEUE);
    let writer = tokio::task::spawn_blocking(move || write_archive(sink, &metadata_json, rx));

    for file in pending {
        let data = match store.read(&file.file_url).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                log::warn!("{board} export: {} is missing, archiving metadata only", file.file_url);
                summary.missing_files += 1;
                continue;
            }
            Err(e) => {
                log::warn!("{board} export: cannot read {}: {e:#}", file.file_url);
                summary.missing_files += 1;
                continue;
            }
        };
        // A closed queue means the writer failed; its error is reported below.
        if tx.send((file.backup_path, data)).await.is_err() {
            break;
        }
        summary.files += 1;
    }
    drop(tx);

    let sink = writer.await.map_err(|e| ArchiveError::Io(std::io::Error::other(e)))??;
    log::info!(
        "exported {board}: {} posts, {} files, {} missing files",
        summary.posts,
        summary.files,
        summary.missing_files
    );
    Ok((sink, summary))
}

/// Blocking half of an export: metadata first, then every queued file.
fn write_archive<W: Write + Seek>(
    sink: W,
    metadata_json: &[u8],
    mut rx: mpsc::Receiver<(String, Vec<u8>)>,
) -> Result<W, ArchiveError> {
    let mut zip = ZipWriter::new(sink);
    zip.start_file(
        METADATA_ENTRY,
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
    )?;
    zip.write_all(metadata_json)?;

    // Photos and videos are already compressed.
    let file_options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .unix_permissions(0o644);

    while let Some((backup_path, data)) = rx.blocking_recv() {
        let large = u64::try_from(data.len()).unwrap_or(u64::MAX) >= u64::from(u32::MAX);
        zip.start_file(backup_path.as_str(), file_options.clone().large_file(large))?;
        zip.write_all(&data)?;
    }

    Ok(zip.finish()?)
}
