//! Walltime and timestamp parsing for PBS output.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Parse a PBS duration ([[HH:]MM:]SS, hours may exceed 24) to seconds.
///
/// Returns None for empty strings and placeholder values.
pub fn parse_walltime_secs(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() || s == "-" {
        return None;
    }

    let parts: Vec<u64> = s.split(':').map(|p| p.parse().ok()).collect::<Option<_>>()?;

    match parts.len() {
        3 => Some(parts[0] * 3600 + parts[1] * 60 + parts[2]),
        2 => Some(parts[0] * 60 + parts[1]),
        1 => Some(parts[0]),
        _ => None,
    }
}

/// Format seconds as the HH:MM:SS form qsub expects for `-l walltime=`.
pub fn format_walltime(seconds: u64) -> String {
    let hours = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{mins:02}:{secs:02}")
}

/// Parse the asctime-style stamps qstat emits ("Thu Aug  6 10:00:00 2026").
///
/// Every remote command runs under a forced UTC timezone, so the stamp is
/// interpreted as UTC.
pub fn parse_pbs_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() || s == "-" {
        return None;
    }

    NaiveDateTime::parse_from_str(s, "%a %b %e %H:%M:%S %Y")
        .ok()
        .and_then(|dt| Utc.from_local_datetime(&dt).single())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_walltime_secs() {
        assert_eq!(parse_walltime_secs("01:00:00"), Some(3600));
        assert_eq!(parse_walltime_secs("48:30:00"), Some(174600));
        assert_eq!(parse_walltime_secs("30:00"), Some(1800));
        assert_eq!(parse_walltime_secs("90"), Some(90));
        assert_eq!(parse_walltime_secs(""), None);
        assert_eq!(parse_walltime_secs("-"), None);
        assert_eq!(parse_walltime_secs("1:xx:00"), None);
    }

    #[test]
    fn test_format_walltime() {
        assert_eq!(format_walltime(3600), "01:00:00");
        assert_eq!(format_walltime(90061), "25:01:01");
        assert_eq!(format_walltime(0), "00:00:00");
    }

    #[test]
    fn test_parse_pbs_timestamp() {
        let dt = parse_pbs_timestamp("Thu Aug  6 10:15:30 2026").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2026-08-06 10:15:30");

        // double-digit day uses no padding space
        let dt = parse_pbs_timestamp("Mon Dec 14 01:02:03 2026").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2026-12-14");

        assert!(parse_pbs_timestamp("").is_none());
        assert!(parse_pbs_timestamp("not a date").is_none());
    }
}
