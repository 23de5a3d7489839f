//! # legacy-import
//!
//! One-shot migration of a board from the old site's SQL dump:
//!
//! ```text
//! legacy-import 2 FORM_ADMIN --dump ./data/legacy_dump.sql
//! ```
//!
//! Every existing post of the destination board is deleted first, so a
//! rerun replaces the previous migration instead of duplicating it.

use std::path::PathBuf;

use anyhow::Context;
use cb_core::models::BoardType;
use cb_db_sqlite::SqliteBoardRepo;
use cb_legacy::{DumpFilter, DumpTables, ImportOptions, LegacyImporter};
use clap::Parser;
use configs::Settings;

#[derive(Parser)]
#[command(name = "legacy-import")]
#[command(about = "Migrate one board of the legacy site from its SQL dump")]
#[command(version)]
struct Cli {
    /// Numeric board id in the legacy database
    #[arg(value_parser = clap::value_parser!(i64).range(1..))]
    legacy_board_id: i64,

    /// Destination board tag, e.g. NOTICE or FORM_ADMIN
    board_type: BoardType,

    /// SQL dump to read (defaults to legacy.dump_path)
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Legacy posts table (defaults to legacy.posts_table)
    #[arg(long)]
    posts_table: Option<String>,

    /// Legacy attachments table (defaults to legacy.files_table)
    #[arg(long)]
    files_table: Option<String>,

    /// Database URL (defaults to database.url)
    #[arg(long)]
    database: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let cli = Cli::parse();
    let settings = Settings::load()?;
    let legacy = settings.legacy;

    let dump = cli.dump.unwrap_or(legacy.dump_path);
    let tables = DumpTables {
        posts: cli.posts_table.unwrap_or(legacy.posts_table),
        attachments: cli.files_table.unwrap_or(legacy.files_table),
    };
    let database = cli.database.unwrap_or(settings.database.url);

    println!(
        "Migrating legacy board {} into {} from {}",
        cli.legacy_board_id,
        cli.board_type,
        dump.display()
    );

    // Parsing a multi-gigabyte dump is blocking work.
    let filter = DumpFilter::new(tables, cli.legacy_board_id).with_progress_interval(legacy.progress_interval);
    let extract = tokio::task::spawn_blocking(move || filter.extract_file(&dump))
        .await
        .context("dump reader panicked")??;

    let stats = extract.stats.clone();
    println!(
        "Read {} lines: {} posts and {} attachments kept, {} rows rejected, {} malformed lines",
        stats.lines,
        extract.posts.len(),
        extract.attachments.len(),
        stats.rejected_rows,
        stats.malformed_lines
    );

    let repo = SqliteBoardRepo::new(&database)
        .await
        .with_context(|| format!("failed to open database {database}"))?;
    let options = ImportOptions {
        board_type: cli.board_type.clone(),
        author_email: legacy.author_email,
        author_name: legacy.author_name,
    };
    let report = LegacyImporter::new(&repo, options).run(extract).await?;

    println!("Migration of {} finished", cli.board_type);
    println!("  deleted before import: {}", report.deleted);
    println!("  posts created:         {}", report.created);
    println!("  posts failed:          {}", report.failed);
    println!("  attachments created:   {}", report.attachments);
    println!("  attachments failed:    {}", report.failed_attachments);
    println!("  posts without a date:  {}", report.undated);
    if report.failed > 0 || report.failed_attachments > 0 {
        log::warn!("some rows were not migrated; see the warnings above for their legacy ids");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_shape() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_board_id_must_be_positive() {
        assert!(Cli::try_parse_from(["legacy-import", "0", "NOTICE"]).is_err());
        assert!(Cli::try_parse_from(["legacy-import", "abc", "NOTICE"]).is_err());
        assert!(Cli::try_parse_from(["legacy-import", "2"]).is_err());

        let cli = Cli::try_parse_from(["legacy-import", "2", "form_admin", "--dump", "x.sql"]).unwrap();
        assert_eq!(cli.legacy_board_id, 2);
        assert_eq!(cli.board_type.as_str(), "FORM_ADMIN");
        assert_eq!(cli.dump, Some(PathBuf::from("x.sql")));
    }
}
