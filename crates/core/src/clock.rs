// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wall-clock helpers.

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn epoch_ms_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Parse an ISO-8601 timestamp (e.g. `git log --format=%cI` output) into
/// epoch milliseconds. Returns `None` for unparseable input.
pub fn parse_iso_ms(s: &str) -> Option<u64> {
    chrono::DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.timestamp_millis().max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_ms_is_recent() {
        // Anything after 2020 counts as sane.
        assert!(epoch_ms_now() > 1_577_836_800_000);
    }

    #[test]
    fn test_parse_iso_ms() {
        assert_eq!(parse_iso_ms("1970-01-01T00:00:01+00:00"), Some(1000));
        assert!(parse_iso_ms("2024-06-01T12:00:00+02:00").is_some());
        assert_eq!(parse_iso_ms("not a date"), None);
    }
}
