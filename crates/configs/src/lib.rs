//! # configs
//!
//! Layered settings for the church-board binaries: built-in defaults, then
//! an optional `church-board.toml`, then `CHURCH_BOARD_*` environment
//! variables (`__` separates nesting, e.g. `CHURCH_BOARD_SERVER__PORT`).

use std::path::PathBuf;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

pub const ENV_PREFIX: &str = "CHURCH_BOARD";
pub const CONFIG_FILE: &str = "church-board";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub media: MediaSettings,
    #[serde(default)]
    pub admin: AdminSettings,
    pub legacy: LegacySettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Extra origin allowed to call the admin API from a browser.
    #[serde(default)]
    pub cors_origin: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaSettings {
    /// Directory served at `/`; attachment URLs resolve under it.
    pub public_root: PathBuf,
    /// First URL segment of stored uploads, e.g. `uploads`.
    pub upload_dir: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminSettings {
    /// Argon2 PHC string of the admin token. Without it every admin
    /// request is refused.
    #[serde(default)]
    pub password_hash: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacySettings {
    pub dump_path: PathBuf,
    pub posts_table: String,
    pub files_table: String,
    /// Account that owns migrated and restored posts when none is given.
    pub author_email: String,
    pub author_name: String,
    pub progress_interval: u64,
}

impl Settings {
    /// Reads `.env`, the optional config file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                log::warn!("ignoring unreadable .env file: {e}");
            }
        }

        let settings = Self::defaults()?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Builder preloaded with every default; further sources override it.
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let builder = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "sqlite:church_board.db")?
            .set_default("media.public_root", "./public")?
            .set_default("media.upload_dir", "uploads")?
            .set_default("legacy.dump_path", "./data/legacy_dump.sql")?
            .set_default("legacy.posts_table", "tb_board")?
            .set_default("legacy.files_table", "tb_board_file")?
            .set_default("legacy.author_email", "legacy-import@church-board.local")?
            .set_default("legacy.author_name", "관리자")?
            .set_default("legacy.progress_interval", 100_000)?;
        Ok(builder)
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }
}
