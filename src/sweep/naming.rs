//! Snapshot naming.
//!
//! DynamoDB backup names only allow `[a-zA-Z0-9_.-]`. Periods are replaced
//! as well, so the timestamp reads as one hyphen-separated run.

use chrono::{DateTime, Utc};

/// Characters replaced by a hyphen in generated snapshot names.
pub const DISALLOWED_CHARS: [char; 3] = [' ', '.', ':'];

/// Build the snapshot name for `table` at instant `at`.
///
/// `orders` at `2024-03-05 07:08:09.123456 UTC` becomes
/// `orders-2024-03-05-07-08-09-123456`.
pub fn snapshot_name(table: &str, at: DateTime<Utc>) -> String {
    let raw = format!("{}-{}", table, at.format("%Y-%m-%d %H:%M:%S%.6f"));
    sanitize_snapshot_name(&raw)
}

/// Replace each space, period and colon with exactly one hyphen.
pub fn sanitize_snapshot_name(raw: &str) -> String {
    raw.chars()
        .map(|c| if DISALLOWED_CHARS.contains(&c) { '-' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_snapshot_name_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap()
            + chrono::Duration::microseconds(123_456);
        assert_eq!(
            snapshot_name("orders", at),
            "orders-2024-03-05-07-08-09-123456"
        );
    }

    #[test]
    fn test_snapshot_name_is_deterministic() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(snapshot_name("orders", at), snapshot_name("orders", at));
        assert_ne!(
            snapshot_name("orders", at),
            snapshot_name("orders", at + chrono::Duration::seconds(1))
        );
    }

    #[test]
    fn test_table_name_periods_are_sanitized() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        let name = snapshot_name("app.orders", at);
        assert!(name.starts_with("app-orders-2024-03-05-07-08-09-"));
        assert!(!name.contains(DISALLOWED_CHARS));
    }

    #[rstest]
    #[case("a b", "a-b")]
    #[case("a.b", "a-b")]
    #[case("a:b", "a-b")]
    #[case("a  b", "a--b")]
    #[case(" .:", "---")]
    #[case("plain_name-1", "plain_name-1")]
    #[case("", "")]
    fn test_sanitize_one_hyphen_per_char(#[case] raw: &str, #[case] expected: &str) {
        let sanitized = sanitize_snapshot_name(raw);
        assert_eq!(sanitized, expected);
        assert_eq!(sanitized.chars().count(), raw.chars().count());
    }
}
