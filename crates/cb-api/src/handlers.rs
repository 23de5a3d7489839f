//! # cb-api Handlers
//!
//! Admin endpoints that move whole boards in and out as zip archives.

use std::fs::File;
use std::io::{BufReader, Seek};

use actix_files::NamedFile;
use actix_multipart::{Field, Multipart};
use actix_web::http::header::{self, ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse};
use cb_archive::{archive_file_name, export_board, BoardLocks, BoardRestorer, RestoreMode, RestoreOptions};
use cb_core::error::AppError;
use cb_core::models::BoardType;
use cb_core::traits::{AccessGuard, BoardRepo, MediaStore};
use chrono::Local;
use futures_util::StreamExt;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::error::ApiError;

/// Longest accepted value of a text form field.
const MAX_TEXT_FIELD: usize = 256;

/// Account used for restored posts when the request names none.
#[derive(Debug, Clone)]
pub struct DefaultAuthor {
    pub email: String,
    pub name: String,
}

/// State shared across all Actix-web workers.
pub struct AppState {
    pub repo: Box<dyn BoardRepo>,
    pub store: Box<dyn MediaStore>,
    pub guard: Box<dyn AccessGuard>,
    pub locks: BoardLocks,
    pub default_author: DefaultAuthor,
}

#[derive(Debug, Serialize)]
pub struct RestoreResponse {
    pub success: bool,
    pub message: String,
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(str::trim).filter(|token| !token.is_empty())
}

async fn require_admin(data: &AppState, req: &HttpRequest) -> Result<(), ApiError> {
    match bearer_token(req) {
        Some(token) if data.guard.is_admin(token).await => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

/// `GET /admin/boards/{board_type}/backup`
///
/// The archive is assembled in an anonymous temp file and streamed from
/// there, so memory use does not grow with the board.
pub async fn backup_board(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<NamedFile, ApiError> {
    require_admin(&data, &req).await?;
    let board: BoardType = path.into_inner().parse()?;

    let spool = tempfile::tempfile()?;
    let (mut spool, summary) = export_board(&*data.repo, &*data.store, &board, spool).await?;
    spool.rewind()?;

    let file_name = archive_file_name(&board, Local::now().date_naive());
    log::info!("serving {file_name} ({} posts, {} files)", summary.posts, summary.files);

    Ok(NamedFile::from_file(spool, &file_name)?.set_content_disposition(ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(file_name)],
    }))
}

/// `POST /admin/boards/{board_type}/restore`
///
/// Multipart fields: `file` (the archive), `mode` (`merge` or
/// `overwrite`, default merge) and an optional `authorId`.
pub async fn restore_board(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    require_admin(&data, &req).await?;
    let board: BoardType = path.into_inner().parse()?;

    let mut upload: Option<File> = None;
    let mut mode = String::new();
    let mut author: Option<String> = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| ApiError::BadRequest(format!("malformed upload: {e}")))?;
        let name = field.content_disposition().get_name().unwrap_or_default().to_owned();
        match name.as_str() {
            "file" => upload = Some(spool_field(&mut field).await?),
            "mode" => mode = read_text_field(&mut field).await?,
            "authorId" => author = Some(read_text_field(&mut field).await?),
            other => {
                log::debug!("ignoring unexpected form field {other:?}");
                while let Some(chunk) = field.next().await {
                    chunk.map_err(|e| ApiError::BadRequest(format!("malformed upload: {e}")))?;
                }
            }
        }
    }

    let upload = upload.ok_or_else(|| ApiError::BadRequest("no backup file uploaded".into()))?;
    let mode: RestoreMode = mode.parse()?;
    let author_id = resolve_author(&data, author.as_deref()).await?;

    let options = RestoreOptions { board_type: board.clone(), mode, author_id };
    let report = BoardRestorer::new(&*data.repo, &*data.store, &data.locks)
        .restore(BufReader::new(upload), &options)
        .await?;

    Ok(HttpResponse::Ok().json(RestoreResponse {
        success: true,
        message: format!(
            "{board} restored ({mode}): {} imported, {} skipped, {} failed",
            report.imported, report.skipped, report.failed
        ),
        imported: report.imported,
        skipped: report.skipped,
        failed: report.failed,
    }))
}

/// Copies an uploaded file into an anonymous temp file, rewound for reading.
/// Writes go through tokio's blocking pool, not the worker thread.
async fn spool_field(field: &mut Field) -> Result<File, ApiError> {
    let mut spool = tokio::fs::File::from_std(tempfile::tempfile()?);
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| ApiError::BadRequest(format!("upload interrupted: {e}")))?;
        spool.write_all(&chunk).await?;
    }
    spool.flush().await?;
    let mut spool = spool.into_std().await;
    spool.rewind()?;
    Ok(spool)
}

async fn read_text_field(field: &mut Field) -> Result<String, ApiError> {
    let mut raw = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| ApiError::BadRequest(format!("malformed upload: {e}")))?;
        if raw.len() + chunk.len() > MAX_TEXT_FIELD {
            return Err(ApiError::BadRequest("form field too long".into()));
        }
        raw.extend_from_slice(&chunk);
    }
    String::from_utf8(raw)
        .map(|text| text.trim().to_owned())
        .map_err(|_| ApiError::BadRequest("form field is not valid UTF-8".into()))
}

/// Picks the owner of restored posts: the requested account if it exists,
/// otherwise the configured default author (created on first use).
async fn resolve_author(data: &AppState, requested: Option<&str>) -> Result<i64, ApiError> {
    match requested.filter(|raw| !raw.is_empty()) {
        Some(raw) => {
            let id: i64 = raw.parse().map_err(|_| ApiError::BadRequest(format!("authorId {raw:?} is not a number")))?;
            let exists = data.repo.user_exists(id).await.map_err(|e| ApiError::Internal(format!("{e:#}")))?;
            if exists {
                Ok(id)
            } else {
                Err(AppError::NotFound("account", id.to_string()).into())
            }
        }
        None => {
            let author = &data.default_author;
            data.repo
                .ensure_user(&author.email, &author.name)
                .await
                .map_err(|e| ApiError::Internal(format!("{e:#}")))
        }
    }
}
