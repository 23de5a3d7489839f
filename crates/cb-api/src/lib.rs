//! # cb-api
//!
//! The web routing layer for board backup and restore.

pub mod error;
pub mod handlers;
pub mod middleware;

use actix_web::web;

pub use error::ApiError;
pub use handlers::{AppState, DefaultAuthor};

/// Mounts the admin routes.
///
/// # Developer Note
/// Routes are registered on a scope so the binary can place the admin API
/// under a prefix if needed.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin/boards")
            .route("/{board_type}/backup", web::get().to(handlers::backup_board))
            .route("/{board_type}/restore", web::post().to(handlers::restore_board)),
    );
}
