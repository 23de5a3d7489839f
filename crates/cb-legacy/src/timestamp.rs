//! Legacy `YYYYMMDDHHMMSS` timestamps.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Slices the first 14 digits into calendar fields.
///
/// Returns `None` for short, non-numeric or out-of-range values
/// (e.g. month `13`).
pub fn parse_legacy_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    let digits = raw.as_bytes().get(..14)?;
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }

    let field = |from: usize, to: usize| raw[from..to].parse::<u32>().ok();
    let year = raw[0..4].parse::<i32>().ok()?;

    NaiveDate::from_ymd_opt(year, field(4, 6)?, field(6, 8)?)?
        .and_hms_opt(field(8, 10)?, field(10, 12)?, field(12, 14)?)
}

/// Interprets a legacy timestamp as wall-clock time of this host.
///
/// Returns `None` when the value cannot be parsed or does not exist
/// locally (a skipped DST hour).
pub fn legacy_timestamp_to_utc(raw: &str) -> Option<DateTime<Utc>> {
    let naive = parse_legacy_timestamp(raw)?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}
