//! Writes extracted legacy rows into the destination board.

use std::collections::{HashMap, HashSet};

use cb_core::models::{BoardType, NewAttachment, NewPost};
use cb_core::traits::BoardRepo;
use chrono::Utc;

use crate::columns::LegacyAttachmentRow;
use crate::dump::DumpExtract;
use crate::error::LegacyError;
use crate::timestamp::legacy_timestamp_to_utc;

/// Destination of an import run.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub board_type: BoardType,
    /// Fallback account owning every imported post, created if absent.
    pub author_email: String,
    pub author_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Posts of the destination board removed before importing
    pub deleted: u64,
    pub created: u64,
    pub failed: u64,
    pub attachments: u64,
    pub failed_attachments: u64,
    /// Posts whose legacy timestamp was unusable and got "now" instead
    pub undated: u64,
}

pub struct LegacyImporter<'a> {
    repo: &'a dyn BoardRepo,
    options: ImportOptions,
}

impl<'a> LegacyImporter<'a> {
    pub fn new(repo: &'a dyn BoardRepo, options: ImportOptions) -> Self {
        Self { repo, options }
    }

    /// Replaces the destination board's posts with the extracted rows.
    ///
    /// Clearing the board first makes re-runs converge on the same state.
    /// Individual posts or attachments that fail to insert are logged and
    /// counted; only failures of the clearing step or of the fallback
    /// account abort the run.
    pub async fn run(&self, extract: DumpExtract) -> Result<ImportReport, LegacyError> {
        let board = &self.options.board_type;
        let mut report = ImportReport {
            deleted: self.repo.delete_posts_by_board(board).await.map_err(LegacyError::Storage)?,
            ..ImportReport::default()
        };
        log::info!("removed {} existing {board} posts", report.deleted);

        let author_id = self
            .repo
            .ensure_user(&self.options.author_email, &self.options.author_name)
            .await
            .map_err(LegacyError::Storage)?;

        let attachments = group_attachments(extract.attachments, &extract.posts.iter().map(|p| p.id).collect());
        let total = extract.posts.len();
        let mut seen = HashSet::new();

        for (index, legacy) in extract.posts.into_iter().enumerate() {
            if !seen.insert(legacy.id) {
                log::warn!("legacy post id {} appears more than once in the dump", legacy.id);
            }
            let created_at = legacy_timestamp_to_utc(&legacy.date).unwrap_or_else(|| {
                log::debug!("legacy post {} has unusable date {:?}", legacy.id, legacy.date);
                report.undated += 1;
                Utc::now()
            });

            let post = NewPost {
                board_type: board.clone(),
                title: legacy.title,
                content: legacy.content,
                author_id,
                author_name: Some(legacy.author).filter(|name| !name.is_empty()),
                category: legacy.category,
                view_count: 0,
                is_notice: false,
                created_at,
                updated_at: created_at,
            };

            let post_id = match self.repo.create_post(post).await {
                Ok(id) => id,
                Err(e) => {
                    log::warn!("failed to import legacy post {}: {e:#}", legacy.id);
                    report.failed += 1;
                    continue;
                }
            };
            report.created += 1;

            // Every copy of a repeated legacy id gets the attachments.
            for file in attachments.get(&legacy.id).cloned().unwrap_or_default() {
                let attachment = NewAttachment {
                    post_id,
                    mime_type: mime_guess::from_path(&file.file_name).first_or_octet_stream().to_string(),
                    file_name: file.file_name,
                    file_url: file.file_path,
                    file_size: file.file_size,
                };
                match self.repo.create_attachment(attachment).await {
                    Ok(_) => report.attachments += 1,
                    Err(e) => {
                        log::warn!("failed to import legacy attachment {} of post {}: {e:#}", file.id, legacy.id);
                        report.failed_attachments += 1;
                    }
                }
            }

            if (index + 1) % 100 == 0 {
                log::info!("imported {}/{total} posts", index + 1);
            }
        }

        log::info!(
            "legacy import into {board} finished: {} created, {} failed, {} attachments ({} failed)",
            report.created,
            report.failed,
            report.attachments,
            report.failed_attachments
        );
        Ok(report)
    }
}

/// Keeps only attachments of retained posts, grouped by legacy post id.
fn group_attachments(
    rows: Vec<LegacyAttachmentRow>,
    post_ids: &HashSet<i64>,
) -> HashMap<i64, Vec<LegacyAttachmentRow>> {
    let mut grouped: HashMap<i64, Vec<LegacyAttachmentRow>> = HashMap::new();
    for row in rows.into_iter().filter(|row| post_ids.contains(&row.post_id)) {
        grouped.entry(row.post_id).or_default().push(row);
    }
    grouped
}
