//! Local wall-clock readings for the `get_current_time` tool.

use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;

/// `2025年01月02日 15時04分05秒`
pub const JAPANESE_FORMAT: &str = "%Y年%m月%d日 %H時%M分%S秒";

/// One reading of the clock, in display and machine form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClockReading {
    /// Local time in [`JAPANESE_FORMAT`].
    pub time: String,
    /// RFC 3339 timestamp with offset.
    pub iso: String,
}

impl ClockReading {
    pub fn at<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            time: instant.format(JAPANESE_FORMAT).to_string(),
            iso: instant.to_rfc3339(),
        }
    }

    pub fn now() -> Self {
        Self::at(&Local::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_reading_formats() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let instant = tokyo.with_ymd_and_hms(2025, 1, 2, 15, 4, 5).unwrap();
        let reading = ClockReading::at(&instant);
        assert_eq!(reading.time, "2025年01月02日 15時04分05秒");
        assert_eq!(reading.iso, "2025-01-02T15:04:05+09:00");
    }
}
