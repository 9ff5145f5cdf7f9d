use std::fmt;

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Column headers the worksheet must expose, in no particular order.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    COL_TITLE,
    COL_CONTENT,
    COL_IMAGE_URL,
    COL_STATUS,
    COL_ITERATION,
    COL_MODERATOR_NOTE,
    COL_LOCK,
];

pub const COL_TITLE: &str = "Title";
pub const COL_CONTENT: &str = "Content";
pub const COL_IMAGE_URL: &str = "Image URL";
pub const COL_STATUS: &str = "Status";
pub const COL_ITERATION: &str = "Iteration";
pub const COL_MODERATOR_NOTE: &str = "Moderator Note";
pub const COL_LOCK: &str = "Lock";

/// Lifecycle status of a work-item row, persisted verbatim in the
/// `Status` column.
///
/// `Prepared` is the only state eligible for pickup; the remaining three are
/// terminal and require a manual reset in the sheet to reprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    Prepared,
    Written,
    WrittenNotModerated,
    Error,
}

impl RowStatus {
    /// The exact cell value for this status.
    pub fn as_sheet_value(&self) -> &'static str {
        match self {
            RowStatus::Prepared => "Prepared",
            RowStatus::Written => "Written",
            RowStatus::WrittenNotModerated => "Written (not moderated)",
            RowStatus::Error => "Error",
        }
    }

    /// Parse a cell value; anything unrecognized is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Prepared" => Some(RowStatus::Prepared),
            "Written" => Some(RowStatus::Written),
            "Written (not moderated)" => Some(RowStatus::WrittenNotModerated),
            "Error" => Some(RowStatus::Error),
            _ => None,
        }
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sheet_value())
    }
}

/// One work-item row of the sheet, parsed from raw cell values.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// 1-based row index in the worksheet; the stable identifier.
    pub row: u32,
    pub title: String,
    pub content: String,
    pub image_url: String,
    /// `None` when the Status cell is empty or holds an unknown value.
    pub status: Option<RowStatus>,
    pub iteration: u32,
    pub moderator_note: String,
    /// Raw contents of the Lock cell; empty means unlocked.
    pub lock: String,
}

impl WorkItem {
    /// Build a work item from a header row and a data row.
    ///
    /// Cells are trimmed; a data row shorter than the header is padded with
    /// empty strings, extra trailing cells are ignored.
    pub fn from_cells(row: u32, headers: &[String], cells: &[String]) -> Self {
        let get = |column: &str| -> String {
            headers
                .iter()
                .position(|h| h == column)
                .and_then(|idx| cells.get(idx))
                .map(|value| value.trim().to_string())
                .unwrap_or_default()
        };

        Self {
            row,
            title: get(COL_TITLE),
            content: get(COL_CONTENT),
            image_url: get(COL_IMAGE_URL),
            status: RowStatus::parse(&get(COL_STATUS)),
            iteration: get(COL_ITERATION).parse().unwrap_or(0),
            moderator_note: get(COL_MODERATOR_NOTE),
            lock: get(COL_LOCK),
        }
    }

    /// A row is available when its lock cell is empty or the stamp expired.
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        lock_expired(&self.lock, now)
    }
}

/// A *locked-until* stamp written to the Lock column when a row is claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockStamp(DateTime<Utc>);

impl LockStamp {
    /// Stamp expiring `ttl_minutes` from `now`.
    pub fn until(now: DateTime<Utc>, ttl_minutes: i64) -> Self {
        Self(now + Duration::minutes(ttl_minutes))
    }

    /// Cell representation: RFC 3339 UTC with a trailing `Z`.
    pub fn render(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

impl fmt::Display for LockStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Whether a lock cell no longer protects its row.
///
/// Empty cells are expired. A stamp in the past is expired. A non-empty
/// value that does not parse is treated as still held.
pub fn lock_expired(value: &str, now: DateTime<Utc>) -> bool {
    if value.is_empty() {
        return true;
    }
    match DateTime::parse_from_rfc3339(value) {
        Ok(locked_until) => locked_until.with_timezone(&Utc) <= now,
        Err(_) => false,
    }
}

/// Convert a 1-based column index into its A1 letter form.
pub fn column_to_a1(index: u32) -> String {
    let mut letters = Vec::new();
    let mut current = index;
    while current > 0 {
        let remainder = (current - 1) % 26;
        letters.push((b'A' + remainder as u8) as char);
        current = (current - 1) / 26;
    }
    letters.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn column_letters() {
        assert_eq!(column_to_a1(1), "A");
        assert_eq!(column_to_a1(7), "G");
        assert_eq!(column_to_a1(26), "Z");
        assert_eq!(column_to_a1(27), "AA");
        assert_eq!(column_to_a1(52), "AZ");
        assert_eq!(column_to_a1(703), "AAA");
    }

    #[test]
    fn status_round_trips_sheet_values() {
        for status in [
            RowStatus::Prepared,
            RowStatus::Written,
            RowStatus::WrittenNotModerated,
            RowStatus::Error,
        ] {
            assert_eq!(RowStatus::parse(status.as_sheet_value()), Some(status));
        }
        assert_eq!(RowStatus::parse(""), None);
        assert_eq!(RowStatus::parse("In Progress"), None);
    }

    #[test]
    fn work_item_from_short_row_pads_missing_cells() {
        let headers = strings(&REQUIRED_COLUMNS);
        let item = WorkItem::from_cells(2, &headers, &strings(&[" Статья "]));
        assert_eq!(item.row, 2);
        assert_eq!(item.title, "Статья");
        assert_eq!(item.content, "");
        assert_eq!(item.status, None);
        assert_eq!(item.iteration, 0);
        assert_eq!(item.lock, "");
    }

    #[test]
    fn work_item_respects_header_order() {
        // Extra columns before the required ones must not shift parsing.
        let headers = strings(&["Notes", "Status", "Title", "Lock"]);
        let item = WorkItem::from_cells(5, &headers, &strings(&["x", "Prepared", "Hello", ""]));
        assert_eq!(item.status, Some(RowStatus::Prepared));
        assert_eq!(item.title, "Hello");
    }

    #[test]
    fn work_item_parses_iteration_leniently() {
        let headers = strings(&["Iteration"]);
        assert_eq!(WorkItem::from_cells(2, &headers, &strings(&["3"])).iteration, 3);
        assert_eq!(WorkItem::from_cells(2, &headers, &strings(&[""])).iteration, 0);
        assert_eq!(
            WorkItem::from_cells(2, &headers, &strings(&["abc"])).iteration,
            0
        );
    }

    #[test]
    fn lock_expiry_rules() {
        let now = Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap();
        assert!(lock_expired("", now));
        assert!(lock_expired("2026-08-07T11:59:59Z", now));
        assert!(lock_expired("2026-08-07T12:00:00Z", now));
        assert!(!lock_expired("2026-08-07T12:00:01Z", now));
        // Garbage is fail-closed: the row stays protected.
        assert!(!lock_expired("not-a-timestamp", now));
    }

    #[test]
    fn lock_stamp_renders_with_z_suffix() {
        let now = Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap();
        let stamp = LockStamp::until(now, 15);
        assert_eq!(stamp.render(), "2026-08-07T12:15:00Z");
        assert!(!lock_expired(&stamp.render(), now));
    }
}
