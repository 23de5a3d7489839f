//! # church-board Binary
//!
//! The entry point that assembles the admin server based on compile-time features.

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use cb_api::{configure_routes, middleware, AppState, DefaultAuthor};
use cb_archive::BoardLocks;
use configs::Settings;

#[cfg(feature = "db-sqlite")]
use cb_db_sqlite::SqliteBoardRepo;

#[cfg(feature = "storage-local")]
use cb_storage_local::LocalMediaStore;

#[cfg(feature = "auth-simple")]
use cb_auth_simple::SimpleAccessGuard;

#[cfg(not(all(feature = "db-sqlite", feature = "storage-local", feature = "auth-simple")))]
compile_error!("church-board needs the db-sqlite, storage-local and auth-simple features");

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let settings = Settings::load()?;

    // 1. Initialize Database Implementation
    #[cfg(feature = "db-sqlite")]
    let repo = SqliteBoardRepo::new(&settings.database.url)
        .await
        .with_context(|| format!("failed to open database {}", settings.database.url))?;

    // 2. Initialize Storage Implementation
    let public_root = settings.media.public_root.clone();
    std::fs::create_dir_all(public_root.join(&settings.media.upload_dir))
        .with_context(|| format!("failed to create upload directory under {}", public_root.display()))?;
    #[cfg(feature = "storage-local")]
    let store = LocalMediaStore::new(public_root.clone(), settings.media.upload_dir.clone());

    // 3. Initialize Auth Implementation
    #[cfg(feature = "auth-simple")]
    let guard = SimpleAccessGuard::new(settings.admin.password_hash.clone());

    // 4. Wrap in AppState (Using dynamic dispatch for maximum flexibility)
    let state = web::Data::new(AppState {
        repo: Box::new(repo),
        store: Box::new(store),
        guard: Box::new(guard),
        locks: BoardLocks::new(),
        default_author: DefaultAuthor {
            email: settings.legacy.author_email.clone(),
            name: settings.legacy.author_name.clone(),
        },
    });

    let (host, port) = settings.bind_address();
    let cors_origin = settings.server.cors_origin.clone();
    log::info!("church-board starting on http://{host}:{port}, serving {}", public_root.display());

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::cors_policy(cors_origin.as_deref()))
            .wrap(middleware::standard_middleware())
            .configure(configure_routes)
            // Public assets, attachments included; must stay last.
            .service(actix_files::Files::new("/", public_root.clone()).index_file("index.html"))
    })
    .bind((host.as_str(), port))
    .with_context(|| format!("failed to bind {host}:{port}"))?
    .run()
    .await?;

    Ok(())
}
