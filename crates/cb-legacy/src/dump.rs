//! Line-oriented extraction of legacy rows from a SQL dump.
//!
//! The dump is streamed one line at a time, so memory is bounded by the
//! longest `INSERT` line plus the rows that survive the board filter.

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

use crate::columns::{
    AttachmentColumns, LegacyAttachmentRow, LegacyPostRow, PostColumns, ATTACHMENT_COLUMNS, POST_COLUMNS,
};
use crate::error::LegacyError;
use crate::tokenizer::tokenize_values;

pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100_000;

/// Names of the two legacy tables the importer understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpTables {
    pub posts: String,
    pub attachments: String,
}

/// Counters gathered while scanning a dump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub lines: u64,
    /// Post rows whose board id differs from the target
    pub foreign_posts: u64,
    /// Rows that tokenized but could not be mapped
    pub rejected_rows: u64,
    /// `INSERT` lines the tokenizer could not split
    pub malformed_lines: u64,
}

/// Output of a scan: the target board's posts and every attachment row.
#[derive(Debug, Clone, Default)]
pub struct DumpExtract {
    pub posts: Vec<LegacyPostRow>,
    pub attachments: Vec<LegacyAttachmentRow>,
    pub stats: ExtractStats,
}

enum Table {
    Posts,
    Attachments,
}

/// Scans a dump for one legacy board.
pub struct DumpFilter {
    tables: DumpTables,
    target_board_id: i64,
    post_columns: PostColumns,
    attachment_columns: AttachmentColumns,
    progress_interval: u64,
}

impl DumpFilter {
    pub fn new(tables: DumpTables, target_board_id: i64) -> Self {
        Self {
            tables,
            target_board_id,
            post_columns: POST_COLUMNS,
            attachment_columns: ATTACHMENT_COLUMNS,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Lines between progress log messages; `0` silences them.
    pub fn with_progress_interval(mut self, lines: u64) -> Self {
        self.progress_interval = lines;
        self
    }

    /// Opens and scans the dump at `path`. A missing file is fatal.
    pub fn extract_file(&self, path: &Path) -> Result<DumpExtract, LegacyError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LegacyError::DumpNotFound(path.to_path_buf()),
            _ => LegacyError::Io(e),
        })?;
        log::info!("scanning {} for legacy board {}", path.display(), self.target_board_id);
        self.extract(BufReader::new(file))
    }

    pub fn extract<R: BufRead>(&self, mut reader: R) -> Result<DumpExtract, LegacyError> {
        let mut out = DumpExtract::default();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            out.stats.lines += 1;
            // Legacy dumps are not guaranteed to be clean UTF-8.
            let line = String::from_utf8_lossy(&buf);
            self.scan_line(&line, &mut out);

            if self.progress_interval > 0 && out.stats.lines % self.progress_interval == 0 {
                log::info!(
                    "scanned {} lines: {} posts kept, {} attachment rows",
                    out.stats.lines,
                    out.posts.len(),
                    out.attachments.len()
                );
            }
        }

        log::info!(
            "dump scan finished: {} lines, {} posts for board {}, {} attachment rows, {} foreign posts, {} rejected rows, {} malformed lines",
            out.stats.lines,
            out.posts.len(),
            self.target_board_id,
            out.attachments.len(),
            out.stats.foreign_posts,
            out.stats.rejected_rows,
            out.stats.malformed_lines
        );
        Ok(out)
    }

    fn scan_line(&self, line: &str, out: &mut DumpExtract) {
        let (table, values) = if let Some(values) = insert_values(line, &self.tables.posts) {
            (Table::Posts, values)
        } else if let Some(values) = insert_values(line, &self.tables.attachments) {
            (Table::Attachments, values)
        } else {
            return;
        };

        let rows = match tokenize_values(values) {
            Ok(rows) => rows,
            Err(e) => {
                log::warn!("skipping malformed INSERT on line {}: {e}", out.stats.lines);
                out.stats.malformed_lines += 1;
                return;
            }
        };

        for fields in rows {
            match table {
                Table::Posts => match LegacyPostRow::from_fields(&fields, &self.post_columns) {
                    Ok(row) if row.board_id == self.target_board_id => out.posts.push(row),
                    Ok(_) => out.stats.foreign_posts += 1,
                    Err(e) => {
                        log::warn!("skipping post row on line {} ({:?}): {e}", out.stats.lines, fields.first());
                        out.stats.rejected_rows += 1;
                    }
                },
                Table::Attachments => match LegacyAttachmentRow::from_fields(&fields, &self.attachment_columns) {
                    Ok(row) => out.attachments.push(row),
                    Err(e) => {
                        log::warn!("skipping attachment row on line {} ({:?}): {e}", out.stats.lines, fields.first());
                        out.stats.rejected_rows += 1;
                    }
                },
            }
        }
    }
}

/// Returns the text after `VALUES` when `line` is an `INSERT INTO` for
/// `table` (backquoted or bare, with or without a column list).
pub fn insert_values<'a>(line: &'a str, table: &str) -> Option<&'a str> {
    let rest = line.trim_start().strip_prefix("INSERT INTO")?.trim_start();

    let rest = match rest.strip_prefix('`') {
        Some(quoted) => quoted.strip_prefix(table)?.strip_prefix('`')?,
        None => {
            let bare = rest.strip_prefix(table)?;
            if !bare.starts_with(|c: char| c.is_whitespace() || c == '(') {
                return None;
            }
            bare
        }
    };

    let mut rest = rest.trim_start();
    if rest.starts_with('(') {
        rest = &rest[rest.find(')')? + 1..];
    }
    rest.trim_start().strip_prefix("VALUES")
}
