//! Canonical time utilities
//!
//! All persisted timestamps are UTC and serialize as RFC3339 with a `Z`
//! suffix.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current UTC timestamp.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Render a timestamp as RFC3339 UTC with `Z` suffix, second precision.
#[must_use]
pub fn to_rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rfc3339_uses_z_suffix() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        assert_eq!(to_rfc3339(ts), "2025-03-14T09:26:53Z");
    }
}
