//! # cb-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `cb-core` domain models.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use cb_core::models::{Attachment, BoardType, NewAttachment, NewPost, Post, PostWithAttachments};
use cb_core::traits::BoardRepo;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

const SCHEMA: &str = include_str!("../schema.sql");

pub struct SqliteBoardRepo {
    pool: SqlitePool,
}

impl SqliteBoardRepo {
    /// Connects to `url` (e.g. `sqlite:church_board.db` or `sqlite::memory:`)
    /// and applies the schema.
    ///
    /// # Developer Note
    /// An in-memory database lives only as long as its connection, so memory
    /// URLs get a single pinned connection instead of a pool.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = url.contains(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&pool).await?;
        }
        log::debug!("sqlite schema ready at {url}");

        Ok(Self { pool })
    }
}

fn row_to_post(row: &SqliteRow) -> anyhow::Result<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        board_type: BoardType::from_str(&row.try_get::<String, _>("board_type")?)?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        author_id: row.try_get("author_id")?,
        author_name: row.try_get("author_name")?,
        category: row.try_get("category")?,
        view_count: row.try_get("view_count")?,
        is_notice: row.try_get("is_notice")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_attachment(row: &SqliteRow) -> anyhow::Result<Attachment> {
    Ok(Attachment {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        file_name: row.try_get("file_name")?,
        file_url: row.try_get("file_url")?,
        file_size: row.try_get("file_size")?,
        mime_type: row.try_get("mime_type")?,
    })
}

#[async_trait]
impl BoardRepo for SqliteBoardRepo {
    async fn ensure_user(&self, email: &str, name: &str) -> anyhow::Result<i64> {
        sqlx::query("INSERT INTO users (email, name, created_at) VALUES (?, ?, ?) ON CONFLICT(email) DO NOTHING")
            .bind(email)
            .bind(name)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        let id = sqlx::query("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?
            .try_get("id")?;
        Ok(id)
    }

    async fn user_exists(&self, id: i64) -> anyhow::Result<bool> {
        let row = sqlx::query("SELECT 1 FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn create_post(&self, post: NewPost) -> anyhow::Result<i64> {
        let result = sqlx::query(
            "INSERT INTO posts (board_type, title, content, author_id, author_name, category, view_count, is_notice, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(post.board_type.as_str())
        .bind(post.title)
        .bind(post.content)
        .bind(post.author_id)
        .bind(post.author_name)
        .bind(post.category)
        .bind(post.view_count)
        .bind(post.is_notice)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn create_attachment(&self, attachment: NewAttachment) -> anyhow::Result<i64> {
        let result = sqlx::query("INSERT INTO attachments (post_id, file_name, file_url, file_size, mime_type) VALUES (?, ?, ?, ?, ?)")
            .bind(attachment.post_id)
            .bind(attachment.file_name)
            .bind(attachment.file_url)
            .bind(attachment.file_size)
            .bind(attachment.mime_type)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Two queries (posts, then every attachment of the board) stitched
    /// together in memory.
    async fn list_posts(&self, board: &BoardType) -> anyhow::Result<Vec<PostWithAttachments>> {
        let posts = sqlx::query("SELECT * FROM posts WHERE board_type = ? ORDER BY created_at ASC, id ASC")
            .bind(board.as_str())
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(row_to_post)
            .collect::<anyhow::Result<Vec<_>>>()?;

        let attachment_rows = sqlx::query(
            "SELECT a.* FROM attachments a JOIN posts p ON p.id = a.post_id WHERE p.board_type = ? ORDER BY a.id ASC",
        )
        .bind(board.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut by_post: HashMap<i64, Vec<Attachment>> = HashMap::new();
        for row in &attachment_rows {
            let attachment = row_to_attachment(row)?;
            by_post.entry(attachment.post_id).or_default().push(attachment);
        }

        Ok(posts
            .into_iter()
            .map(|post| {
                let attachments = by_post.remove(&post.id).unwrap_or_default();
                PostWithAttachments { post, attachments }
            })
            .collect())
    }

    async fn find_posts_by_title(&self, board: &BoardType, title: &str) -> anyhow::Result<Vec<Post>> {
        sqlx::query("SELECT * FROM posts WHERE board_type = ? AND title = ?")
            .bind(board.as_str())
            .bind(title)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(row_to_post)
            .collect()
    }

    async fn count_posts(&self, board: &BoardType) -> anyhow::Result<i64> {
        let count = sqlx::query("SELECT COUNT(*) AS n FROM posts WHERE board_type = ?")
            .bind(board.as_str())
            .fetch_one(&self.pool)
            .await?
            .try_get("n")?;
        Ok(count)
    }

    async fn delete_post(&self, id: i64) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_posts_by_board(&self, board: &BoardType) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM posts WHERE board_type = ?")
            .bind(board.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn get_board_settings(&self, board: &BoardType) -> anyhow::Result<Option<serde_json::Value>> {
        let row = sqlx::query("SELECT settings FROM board_settings WHERE board_type = ?")
            .bind(board.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(serde_json::from_str(&row.try_get::<String, _>("settings")?)?)),
            None => Ok(None),
        }
    }

    async fn upsert_board_settings(&self, board: &BoardType, settings: &serde_json::Value) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO board_settings (board_type, settings, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(board_type) DO UPDATE SET settings = excluded.settings, updated_at = excluded.updated_at",
        )
        .bind(board.as_str())
        .bind(serde_json::to_string(settings)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn board(tag: &str) -> BoardType {
        tag.parse().unwrap()
    }

    fn new_post(board_type: BoardType, author_id: i64, title: &str) -> NewPost {
        let at = Utc.with_ymd_and_hms(2015, 6, 17, 2, 51, 1).unwrap();
        NewPost {
            board_type,
            title: title.into(),
            content: "<p>body</p>".into(),
            author_id,
            author_name: Some("홍길동".into()),
            category: None,
            view_count: 3,
            is_notice: false,
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn test_create_and_list_posts() {
        let repo = SqliteBoardRepo::new("sqlite::memory:").await.unwrap();
        let author = repo.ensure_user("admin@example.org", "admin").await.unwrap();

        let post_id = repo.create_post(new_post(board("GALLERY"), author, "Easter")).await.unwrap();
        repo.create_attachment(NewAttachment {
            post_id,
            file_name: "egg.jpg".into(),
            file_url: "/uploads/gallery/egg.jpg".into(),
            file_size: 42,
            mime_type: "image/jpeg".into(),
        })
        .await
        .unwrap();
        repo.create_post(new_post(board("NOTICE"), author, "Other board")).await.unwrap();

        let listed = repo.list_posts(&board("GALLERY")).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].post.title, "Easter");
        assert_eq!(listed[0].post.author_name.as_deref(), Some("홍길동"));
        assert_eq!(listed[0].post.created_at, Utc.with_ymd_and_hms(2015, 6, 17, 2, 51, 1).unwrap());
        assert_eq!(listed[0].attachments.len(), 1);
        assert_eq!(listed[0].attachments[0].file_size, 42);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_attachments() {
        let repo = SqliteBoardRepo::new("sqlite::memory:").await.unwrap();
        let author = repo.ensure_user("admin@example.org", "admin").await.unwrap();
        let post_id = repo.create_post(new_post(board("GALLERY"), author, "A")).await.unwrap();
        repo.create_attachment(NewAttachment {
            post_id,
            file_name: "a.png".into(),
            file_url: "/uploads/a.png".into(),
            file_size: 1,
            mime_type: "image/png".into(),
        })
        .await
        .unwrap();

        assert_eq!(repo.delete_posts_by_board(&board("GALLERY")).await.unwrap(), 1);

        let orphans: i64 = sqlx::query("SELECT COUNT(*) AS n FROM attachments")
            .fetch_one(&repo.pool)
            .await
            .unwrap()
            .get("n");
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn test_ensure_user_is_idempotent() {
        let repo = SqliteBoardRepo::new("sqlite::memory:").await.unwrap();
        let first = repo.ensure_user("legacy@example.org", "관리자").await.unwrap();
        let second = repo.ensure_user("legacy@example.org", "someone else").await.unwrap();
        assert_eq!(first, second);
        assert!(repo.user_exists(first).await.unwrap());
        assert!(!repo.user_exists(first + 100).await.unwrap());
    }

    #[tokio::test]
    async fn test_post_requires_existing_author() {
        let repo = SqliteBoardRepo::new("sqlite::memory:").await.unwrap();
        assert!(repo.create_post(new_post(board("NOTICE"), 999, "orphan")).await.is_err());
    }

    #[tokio::test]
    async fn test_board_settings_upsert() {
        let repo = SqliteBoardRepo::new("sqlite::memory:").await.unwrap();
        let gallery = board("GALLERY");
        assert!(repo.get_board_settings(&gallery).await.unwrap().is_none());

        repo.upsert_board_settings(&gallery, &serde_json::json!({ "columns": 3 })).await.unwrap();
        repo.upsert_board_settings(&gallery, &serde_json::json!({ "columns": 4 })).await.unwrap();

        let settings = repo.get_board_settings(&gallery).await.unwrap().unwrap();
        assert_eq!(settings["columns"], 4);
    }

    #[tokio::test]
    async fn test_find_posts_by_title() {
        let repo = SqliteBoardRepo::new("sqlite::memory:").await.unwrap();
        let author = repo.ensure_user("admin@example.org", "admin").await.unwrap();
        repo.create_post(new_post(board("NOTICE"), author, "Retreat")).await.unwrap();
        repo.create_post(new_post(board("NOTICE"), author, "Retreat")).await.unwrap();

        assert_eq!(repo.find_posts_by_title(&board("NOTICE"), "Retreat").await.unwrap().len(), 2);
        assert!(repo.find_posts_by_title(&board("GALLERY"), "Retreat").await.unwrap().is_empty());
        assert_eq!(repo.count_posts(&board("NOTICE")).await.unwrap(), 2);
    }
}
