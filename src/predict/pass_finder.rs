use chrono::{DateTime, Duration, Utc};

use crate::predict::{Ephemeris, Observer, Satellite};

const COARSE_STEP_SECONDS: i64 = 60; // 1 minute scan
const SEARCH_WINDOW_MINUTES: i64 = 24 * 60;

/// Time from `now` until the satellite first reaches `min_elevation`.
///
/// Scans minute by minute over the next 24 hours, starting at `now` itself, so
/// a satellite already above the threshold yields zero. Instants whose
/// propagation fails are treated as not visible.
pub fn find_next_pass(
    ephemeris: &dyn Ephemeris,
    satellite: &Satellite,
    observer: &Observer,
    now: DateTime<Utc>,
    min_elevation: f64,
) -> Option<Duration> {
    (0..SEARCH_WINDOW_MINUTES)
        .map(|minute| Duration::seconds(minute * COARSE_STEP_SECONDS))
        .find(|offset| {
            ephemeris
                .position(satellite, observer, now + *offset)
                .map(|p| p.elevation_deg >= min_elevation)
                .unwrap_or(false)
        })
}

/// Human-readable countdown: `42s`, `12m 5s`, `3h 20m`, or `>24h`.
pub fn format_next_pass(until: Option<Duration>) -> String {
    let Some(until) = until else {
        return ">24h".to_string();
    };
    let seconds = until.num_seconds().max(0);
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
