//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binaries.

use async_trait::async_trait;

use crate::models::{BoardType, NewAttachment, NewPost, Post, PostWithAttachments};

/// Data persistence contract for posts, attachments and board settings.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait BoardRepo: Send + Sync {
    // Account Operations
    /// Returns the id of the account with `email`, creating it if absent.
    async fn ensure_user(&self, email: &str, name: &str) -> anyhow::Result<i64>;
    async fn user_exists(&self, id: i64) -> anyhow::Result<bool>;

    // Post Operations
    async fn create_post(&self, post: NewPost) -> anyhow::Result<i64>;
    async fn create_attachment(&self, attachment: NewAttachment) -> anyhow::Result<i64>;
    /// All posts of a board with their attachments, oldest first.
    async fn list_posts(&self, board: &BoardType) -> anyhow::Result<Vec<PostWithAttachments>>;
    async fn find_posts_by_title(&self, board: &BoardType, title: &str) -> anyhow::Result<Vec<Post>>;
    async fn count_posts(&self, board: &BoardType) -> anyhow::Result<i64>;
    /// Deletes one post; storage cascades to its attachment rows.
    async fn delete_post(&self, id: i64) -> anyhow::Result<()>;
    /// Deletes every post of a board and returns how many were removed.
    async fn delete_posts_by_board(&self, board: &BoardType) -> anyhow::Result<u64>;

    // Board Settings
    async fn get_board_settings(&self, board: &BoardType) -> anyhow::Result<Option<serde_json::Value>>;
    async fn upsert_board_settings(&self, board: &BoardType, settings: &serde_json::Value) -> anyhow::Result<()>;
}

/// File storage contract for attachment bytes under the public asset root.
///
/// Deleting an attachment row never implies deleting its file; callers
/// remove files explicitly through [`MediaStore::delete`].
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Reads the file behind a public URL. `None` if it does not exist.
    async fn read(&self, file_url: &str) -> anyhow::Result<Option<Vec<u8>>>;
    /// Stores bytes under a fresh collision-free name inside `folder` and
    /// returns the public URL of the new file.
    async fn save_upload(&self, folder: &str, original_name: &str, data: &[u8]) -> anyhow::Result<String>;
    /// Removes the file behind a public URL. Missing files are not an error.
    async fn delete(&self, file_url: &str) -> anyhow::Result<()>;
}

/// Capability check gating the admin console.
#[async_trait]
pub trait AccessGuard: Send + Sync {
    /// Verifies an admin credential (e.g. the bearer token of a request).
    async fn is_admin(&self, credential: &str) -> bool;
}
