use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};

use crate::config::ConfigError;

/// Maximum age, in whole days, a snapshot may reach before it is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RetentionWindow(u32);

impl RetentionWindow {
    pub const fn days(days: u32) -> Self {
        Self(days)
    }

    pub const fn as_days(&self) -> u32 {
        self.0
    }

    /// The instant before which snapshots are expired: `now - window`.
    ///
    /// A window reaching past the earliest representable instant yields
    /// [`DateTime::<Utc>::MIN_UTC`], so nothing is expired.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        Duration::try_days(i64::from(self.0))
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Strictly older than the cutoff; a snapshot exactly at the cutoff is kept.
    pub fn is_expired(created_at: DateTime<Utc>, cutoff: DateTime<Utc>) -> bool {
        created_at < cutoff
    }
}

impl Default for RetentionWindow {
    fn default() -> Self {
        Self(7)
    }
}

impl fmt::Display for RetentionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} days", self.0)
    }
}

impl FromStr for RetentionWindow {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|_| ConfigError::InvalidRetention(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::rstest;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap()
    }

    #[test]
    fn test_cutoff() {
        let window = RetentionWindow::days(7);
        assert_eq!(
            window.cutoff(now()),
            Utc.with_ymd_and_hms(2024, 6, 8, 10, 30, 0).unwrap()
        );
        assert_eq!(RetentionWindow::days(0).cutoff(now()), now());
    }

    #[rstest]
    #[case::beyond_date_range(100_000_000)]
    #[case::max(u32::MAX)]
    fn test_huge_window_expires_nothing(#[case] days: u32) {
        let cutoff = RetentionWindow::days(days).cutoff(now());
        assert_eq!(cutoff, DateTime::<Utc>::MIN_UTC);
        assert!(!RetentionWindow::is_expired(now() - Duration::days(365 * 100), cutoff));
        assert!(!RetentionWindow::is_expired(DateTime::<Utc>::MIN_UTC, cutoff));
    }

    #[rstest]
    #[case::older(Duration::days(10), true)]
    #[case::one_microsecond_past(Duration::days(7) + Duration::microseconds(1), true)]
    #[case::exactly_at_cutoff(Duration::days(7), false)]
    #[case::younger(Duration::days(3), false)]
    #[case::brand_new(Duration::zero(), false)]
    fn test_is_expired_strict(#[case] age: Duration, #[case] expired: bool) {
        let cutoff = RetentionWindow::days(7).cutoff(now());
        assert_eq!(RetentionWindow::is_expired(now() - age, cutoff), expired);
    }

    #[rstest]
    #[case("7", 7)]
    #[case(" 30 ", 30)]
    #[case("0", 0)]
    #[case("100000000", 100_000_000)]
    fn test_parse_valid(#[case] raw: &str, #[case] days: u32) {
        assert_eq!(raw.parse::<RetentionWindow>().unwrap().as_days(), days);
    }

    #[rstest]
    #[case("-1")]
    #[case("seven")]
    #[case("7.5")]
    #[case("")]
    fn test_parse_invalid(#[case] raw: &str) {
        let err = raw.parse::<RetentionWindow>().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRetention(v) if v == raw));
    }

    #[test]
    fn test_display() {
        assert_eq!(RetentionWindow::days(7).to_string(), "7 days");
    }
}
