//! Fixed-width UTC time keys.
//!
//! Log file identifiers embed their creation time as `YYYY-MM-DD-HH-mm-ss`,
//! with `-` as every separator so the result is filesystem- and URL-safe.
//! Because every field is zero-padded and ordered most-significant first,
//! lexicographic order of formatted keys equals chronological order of the
//! underlying instants. The log store relies on that property to keep index
//! entries sorted by creation time.

use chrono::{DateTime, NaiveDateTime, Utc};

/// strftime pattern for time keys. Second precision; always UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Format an instant as a sortable time key, truncating to whole seconds.
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a time key back into an instant.
pub fn parse_timestamp(value: &str) -> chrono::ParseResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_is_fixed_width_and_dash_separated() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        let key = format_timestamp(instant);
        assert_eq!(key, "2024-03-07-09-05-02");
        assert_eq!(key.len(), 19);
    }

    #[test]
    fn round_trips_whole_second_instants() {
        let instant = Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap();
        let parsed = parse_timestamp(&format_timestamp(instant)).unwrap();
        assert_eq!(parsed, instant);
    }

    #[test]
    fn lexicographic_order_matches_chronological_order() {
        let earlier = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(format_timestamp(earlier) < format_timestamp(later));
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(parse_timestamp("2024-03-07T09:05:02").is_err());
        assert!(parse_timestamp("not-a-time-key").is_err());
        assert!(parse_timestamp("").is_err());
    }
}
