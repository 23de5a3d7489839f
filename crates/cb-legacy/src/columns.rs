//! Column positions in the legacy dump and the typed rows built from them.
//!
//! The legacy schema is only known by position, so every offset lives in
//! [`POST_COLUMNS`] and [`ATTACHMENT_COLUMNS`]; a schema change touches
//! nothing else.

use thiserror::Error;

/// Positions of the post-table columns the importer reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostColumns {
    pub id: usize,
    pub board_id: usize,
    pub author: usize,
    pub title: usize,
    pub content: usize,
    /// 14-digit `YYYYMMDDHHMMSS` timestamp
    pub date: usize,
    /// Optional; older dumps end before this column.
    pub category: usize,
}

/// Positions of the attachment-table columns the importer reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentColumns {
    pub id: usize,
    pub post_id: usize,
    pub file_path: usize,
    pub file_name: usize,
    pub file_size: usize,
}

pub const POST_COLUMNS: PostColumns = PostColumns {
    id: 0,
    board_id: 1,
    author: 4,
    title: 5,
    content: 6,
    date: 7,
    category: 16,
};

pub const ATTACHMENT_COLUMNS: AttachmentColumns = AttachmentColumns {
    id: 0,
    post_id: 1,
    file_path: 4,
    file_name: 5,
    file_size: 7,
};

impl PostColumns {
    /// Fields a row needs before it can be mapped.
    fn required_width(&self) -> usize {
        [self.id, self.board_id, self.author, self.title, self.content, self.date]
            .into_iter()
            .max()
            .unwrap_or(0)
            + 1
    }
}

impl AttachmentColumns {
    fn required_width(&self) -> usize {
        [self.id, self.post_id, self.file_path, self.file_name, self.file_size]
            .into_iter()
            .max()
            .unwrap_or(0)
            + 1
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("row has {found} columns, expected at least {expected}")]
    TooFewColumns { expected: usize, found: usize },

    #[error("column {column} is not a number: {value:?}")]
    NotANumber { column: usize, value: String },
}

/// One legacy content row. Lives only for the duration of a migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyPostRow {
    pub id: i64,
    pub board_id: i64,
    pub title: String,
    pub content: String,
    pub date: String,
    pub author: String,
    pub category: Option<String>,
}

/// One legacy attachment row, keyed to its post by `post_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyAttachmentRow {
    pub id: i64,
    pub post_id: i64,
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
}

fn number(fields: &[String], column: usize) -> Result<i64, RowError> {
    fields[column]
        .trim()
        .parse()
        .map_err(|_| RowError::NotANumber { column, value: fields[column].clone() })
}

/// `NULL` and blank values mean "absent" for optional text columns.
fn optional_text(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("NULL"))
        .map(str::to_owned)
}

fn check_width(fields: &[String], expected: usize) -> Result<(), RowError> {
    if fields.len() < expected {
        return Err(RowError::TooFewColumns { expected, found: fields.len() });
    }
    Ok(())
}

impl LegacyPostRow {
    pub fn from_fields(fields: &[String], columns: &PostColumns) -> Result<Self, RowError> {
        check_width(fields, columns.required_width())?;
        Ok(Self {
            id: number(fields, columns.id)?,
            board_id: number(fields, columns.board_id)?,
            title: fields[columns.title].clone(),
            content: fields[columns.content].clone(),
            date: fields[columns.date].clone(),
            author: optional_text(fields.get(columns.author)).unwrap_or_default(),
            category: optional_text(fields.get(columns.category)),
        })
    }
}

impl LegacyAttachmentRow {
    pub fn from_fields(fields: &[String], columns: &AttachmentColumns) -> Result<Self, RowError> {
        check_width(fields, columns.required_width())?;
        let size = fields[columns.file_size].trim();
        let file_size = if size.is_empty() || size.eq_ignore_ascii_case("NULL") {
            0
        } else {
            number(fields, columns.file_size)?
        };
        Ok(Self {
            id: number(fields, columns.id)?,
            post_id: number(fields, columns.post_id)?,
            file_name: fields[columns.file_name].clone(),
            file_path: fields[columns.file_path].clone(),
            file_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_post_row_mapping() {
        let mut values = vec!["12", "2", "0", "x", "홍길동", "Title", "<p>Body</p>", "20150617115101"];
        values.extend(["", "", "", "", "", "", "", "", "Worship"]);
        let row = LegacyPostRow::from_fields(&fields(&values), &POST_COLUMNS).unwrap();

        assert_eq!(row.id, 12);
        assert_eq!(row.board_id, 2);
        assert_eq!(row.author, "홍길동");
        assert_eq!(row.title, "Title");
        assert_eq!(row.content, "<p>Body</p>");
        assert_eq!(row.date, "20150617115101");
        assert_eq!(row.category.as_deref(), Some("Worship"));
    }

    #[test]
    fn test_post_row_without_category_column() {
        let values = fields(&["1", "2", "0", "x", "NULL", "T", "C", "20150617115101"]);
        let row = LegacyPostRow::from_fields(&values, &POST_COLUMNS).unwrap();
        assert_eq!(row.category, None);
        assert_eq!(row.author, "");
    }

    #[test]
    fn test_short_post_row_is_rejected() {
        let values = fields(&["1", "2", "0"]);
        assert_eq!(
            LegacyPostRow::from_fields(&values, &POST_COLUMNS),
            Err(RowError::TooFewColumns { expected: 8, found: 3 })
        );
    }

    #[test]
    fn test_non_numeric_id_is_rejected() {
        let values = fields(&["abc", "2", "0", "x", "a", "T", "C", "20150617115101"]);
        assert!(matches!(
            LegacyPostRow::from_fields(&values, &POST_COLUMNS),
            Err(RowError::NotANumber { column: 0, .. })
        ));
    }

    #[test]
    fn test_attachment_row_mapping() {
        let values = fields(&["5", "12", "0", "0", "data/file/notice/abc.hwp", "주보.hwp", "0", "2048"]);
        let row = LegacyAttachmentRow::from_fields(&values, &ATTACHMENT_COLUMNS).unwrap();
        assert_eq!(row.id, 5);
        assert_eq!(row.post_id, 12);
        assert_eq!(row.file_path, "data/file/notice/abc.hwp");
        assert_eq!(row.file_name, "주보.hwp");
        assert_eq!(row.file_size, 2048);
    }

    #[test]
    fn test_attachment_null_size_is_zero() {
        let values = fields(&["5", "12", "0", "0", "p", "n", "0", "NULL"]);
        assert_eq!(LegacyAttachmentRow::from_fields(&values, &ATTACHMENT_COLUMNS).unwrap().file_size, 0);
    }
}
