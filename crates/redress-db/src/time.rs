use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

/// Current instant as the RFC 3339 TEXT representation stored in SQLite.
pub fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Parse a stored timestamp. Falls back to the bare "YYYY-MM-DD HH:MM:SS"
/// form SQLite's datetime('now') produces, treated as UTC.
pub fn parse(ts: &str) -> DateTime<Utc> {
    ts.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", ts, e);
            DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let ts = now();
        let parsed = parse(&ts);
        assert!((Utc::now() - parsed).num_seconds().abs() < 5);
    }

    #[test]
    fn sqlite_bare_format() {
        let parsed = parse("2026-08-30 12:00:00");
        assert_eq!(parsed.to_rfc3339(), "2026-08-30T12:00:00+00:00");
    }
}
