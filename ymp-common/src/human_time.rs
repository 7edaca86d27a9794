//! Human-readable track time formatting
//!
//! Provides consistent time display for track lengths and positions:
//! - Under one hour: `M:SS`
//! - One hour or more: `H:MM:SS`

use std::time::Duration;

const SECONDS_PER_HOUR: u64 = 3600;

/// Format whole seconds as a track time.
///
/// # Examples
///
/// ```
/// use ymp_common::human_time::format_track_time;
///
/// assert_eq!(format_track_time(0), "0:00");
/// assert_eq!(format_track_time(215), "3:35");
/// assert_eq!(format_track_time(3661), "1:01:01");
/// ```
pub fn format_track_time(seconds: u64) -> String {
    if seconds < SECONDS_PER_HOUR {
        format!("{}:{:02}", seconds / 60, seconds % 60)
    } else {
        let hours = seconds / SECONDS_PER_HOUR;
        let mins = (seconds % SECONDS_PER_HOUR) / 60;
        let secs = seconds % 60;
        format!("{}:{:02}:{:02}", hours, mins, secs)
    }
}

/// Format a `Duration`, rounding to the nearest second.
pub fn format_duration(duration: Duration) -> String {
    let rounded = (duration.as_millis() + 500) / 1000;
    format_track_time(rounded as u64)
}

/// Format a millisecond count as returned by catalog APIs.
///
/// `None` renders as `--:--` for tracks with unknown length.
pub fn format_millis(millis: Option<u64>) -> String {
    match millis {
        Some(ms) => format_duration(Duration::from_millis(ms)),
        None => "--:--".to_string(),
    }
}
