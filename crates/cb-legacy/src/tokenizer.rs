//! Scanner for the tuple list of a SQL `INSERT ... VALUES` statement.
//!
//! The input is everything after the `VALUES` keyword, e.g.
//! `(1,'a,b)c','x'),(2,'O\'Brien',NULL);`. Each row comes back as its raw
//! field strings: quotes stripped, backslash escapes resolved, unquoted
//! values (numbers, `NULL`) passed through as written.
//!
//! The scan is a single left-to-right pass over an explicit [`State`]; it
//! never backtracks. Unbalanced quotes or parentheses are reported as a
//! [`TokenizeError`] instead of yielding a truncated row.

use thiserror::Error;

/// One tuple's field values, in column order.
pub type Row = Vec<String>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("string literal opened at byte {start} is never closed")]
    UnterminatedString { start: usize },

    #[error("row opened at byte {start} is never closed")]
    UnclosedRow { start: usize },

    #[error("unexpected {found:?} at byte {offset}")]
    UnexpectedChar { found: char, offset: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Outside any tuple. Whitespace, `,` and the final `;` are skipped.
    BetweenRows,
    /// Inside a tuple, reading an unquoted value or waiting for the next one.
    Unquoted,
    /// Inside a single-quoted literal.
    Quoted,
    /// Right after a backslash inside a literal.
    Escaped,
    /// Right after a literal's closing quote; a second quote re-opens it (`''`).
    AfterQuote,
    /// Whitespace seen after a closed literal; only `,` or `)` may follow.
    Closed,
}

/// Resolves the character following a backslash inside a literal.
fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        '0' => '\0',
        'b' => '\u{8}',
        'Z' => '\u{1a}',
        other => other,
    }
}

/// Splits a `VALUES` tuple list into rows of raw field strings.
pub fn tokenize_values(input: &str) -> Result<Vec<Row>, TokenizeError> {
    let mut rows = Vec::new();
    let mut row: Row = Vec::new();
    let mut field = String::new();
    let mut state = State::BetweenRows;
    let mut row_start = 0;
    let mut quote_start = 0;

    for (offset, ch) in input.char_indices() {
        state = match (state, ch) {
            (State::BetweenRows, '(') => {
                row_start = offset;
                State::Unquoted
            }
            (State::BetweenRows, c) if c == ',' || c == ';' || c.is_whitespace() => State::BetweenRows,
            (State::BetweenRows, found) => return Err(TokenizeError::UnexpectedChar { found, offset }),

            (State::Unquoted, '\'') => {
                if !field.trim().is_empty() {
                    return Err(TokenizeError::UnexpectedChar { found: ch, offset });
                }
                field.clear();
                quote_start = offset;
                State::Quoted
            }
            (State::Unquoted, ',') => {
                row.push(field.trim().to_owned());
                field.clear();
                State::Unquoted
            }
            (State::Unquoted, ')') => {
                row.push(field.trim().to_owned());
                field.clear();
                rows.push(std::mem::take(&mut row));
                State::BetweenRows
            }
            (State::Unquoted, c) => {
                field.push(c);
                State::Unquoted
            }

            (State::Quoted, '\\') => State::Escaped,
            (State::Quoted, '\'') => State::AfterQuote,
            (State::Quoted, c) => {
                field.push(c);
                State::Quoted
            }

            (State::Escaped, c) => {
                field.push(unescape(c));
                State::Quoted
            }

            (State::AfterQuote, '\'') => {
                field.push('\'');
                State::Quoted
            }
            (State::AfterQuote | State::Closed, ',') => {
                row.push(std::mem::take(&mut field));
                State::Unquoted
            }
            (State::AfterQuote | State::Closed, ')') => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
                State::BetweenRows
            }
            (State::AfterQuote | State::Closed, c) if c.is_whitespace() => State::Closed,
            (State::AfterQuote | State::Closed, found) => {
                return Err(TokenizeError::UnexpectedChar { found, offset })
            }
        };
    }

    match state {
        State::BetweenRows => Ok(rows),
        State::Quoted | State::Escaped => Err(TokenizeError::UnterminatedString { start: quote_start }),
        State::Unquoted | State::AfterQuote | State::Closed => Err(TokenizeError::UnclosedRow { start: row_start }),
    }
}
