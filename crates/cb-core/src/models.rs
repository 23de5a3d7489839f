//! # Domain Models
//!
//! These structs represent the persisted entities of Church-Board that the
//! migration and backup tooling reads and writes. Identifiers are the
//! storage layer's integer row ids.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Longest board tag accepted by [`BoardType::from_str`].
const MAX_BOARD_TYPE_LEN: usize = 64;

/// Tag partitioning posts into logical boards (e.g. `NOTICE`, `GALLERY`).
///
/// Tags are normalised to upper case and may only contain ASCII letters,
/// digits and underscores, so they are safe to embed in file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BoardType(String);

impl BoardType {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for BoardType {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let tag = raw.trim().to_ascii_uppercase();
        if tag.is_empty() || tag.len() > MAX_BOARD_TYPE_LEN {
            return Err(AppError::ValidationError(format!(
                "board type must be 1..={MAX_BOARD_TYPE_LEN} characters"
            )));
        }
        if !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(AppError::ValidationError(format!(
                "board type {raw:?} may only contain letters, digits and '_'"
            )));
        }
        Ok(Self(tag))
    }
}

impl TryFrom<String> for BoardType {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BoardType> for String {
    fn from(value: BoardType) -> Self {
        value.0
    }
}

impl fmt::Display for BoardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A board post as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub board_type: BoardType,
    pub title: String,
    pub content: String,
    /// Owning account. Imported posts point at a fallback account.
    pub author_id: i64,
    /// Display name shown instead of the owning account's name, used when
    /// the historical author has no account here.
    pub author_name: Option<String>,
    pub category: Option<String>,
    pub view_count: i64,
    pub is_notice: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for [`Post`]; the id is assigned by storage.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub board_type: BoardType,
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub author_name: Option<String>,
    pub category: Option<String>,
    pub view_count: i64,
    pub is_notice: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A file attached to exactly one post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub post_id: i64,
    /// Original (display) file name
    pub file_name: String,
    /// Public URL, resolved against the public asset root
    pub file_url: String,
    pub file_size: i64,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAttachment {
    pub post_id: i64,
    pub file_name: String,
    pub file_url: String,
    pub file_size: i64,
    pub mime_type: String,
}

/// A post joined with its attachments, as listed for export.
#[derive(Debug, Clone, PartialEq)]
pub struct PostWithAttachments {
    pub post: Post,
    pub attachments: Vec<Attachment>,
}
