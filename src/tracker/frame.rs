use std::collections::HashMap;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::predict::{
    find_next_pass, format_next_pass, Ephemeris, Observer, Satellite, SkyPosition, Subpoint,
};
use crate::scoring::{self, ScoreBoard, ScoringParams};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SatelliteTelemetry {
    pub sky: SkyPosition,
    pub subpoint: Option<Subpoint>,
    pub ground_distance_km: Option<f64>,
}

/// Everything the display and controller need for one refresh, aligned with the
/// satellite set it was computed for. Never mutated once published.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedFrame {
    pub computed_at: DateTime<Utc>,
    pub scores: ScoreBoard,
    pub telemetry: Vec<Option<SatelliteTelemetry>>,
    pub next_passes: Vec<Option<Duration>>,
}

impl CachedFrame {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.computed_at
    }

    /// One-line overview: number, name, elevation or countdown, score; best marked `*`.
    pub fn summary(&self, satellites: &[Satellite]) -> String {
        satellites
            .iter()
            .enumerate()
            .map(|(i, sat)| {
                let marker = if self.scores.best == Some(i) { "*" } else { "" };
                let position = match self.telemetry.get(i).and_then(Option::as_ref) {
                    Some(t) if t.sky.elevation_deg > 0.0 => format!("el {:.1}°", t.sky.elevation_deg),
                    _ => format!(
                        "in {}",
                        format_next_pass(self.next_passes.get(i).copied().flatten())
                    ),
                };
                format!(
                    "{}{} {} {} ({:.1})",
                    i + 1,
                    marker,
                    sat.name,
                    position,
                    self.scores.score(i)
                )
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameSettings {
    pub scoring: ScoringParams,
    pub min_pass_elevation_deg: f64,
}

#[derive(Debug, Clone, Copy)]
struct CachedPass {
    computed_at: DateTime<Utc>,
    until: Option<Duration>,
}

/// Next-pass results per satellite name, searched again only once stale.
#[derive(Debug)]
pub struct NextPassCache {
    refresh: Duration,
    entries: HashMap<String, CachedPass>,
}

impl NextPassCache {
    pub fn new(refresh: StdDuration) -> Self {
        Self {
            refresh: Duration::from_std(refresh).unwrap_or(Duration::MAX),
            entries: HashMap::new(),
        }
    }

    /// Returns the cached value for `name` unless it is older than the refresh
    /// interval, in which case `search` runs and its result is stored.
    pub fn lookup(
        &mut self,
        name: &str,
        now: DateTime<Utc>,
        search: impl FnOnce() -> Option<Duration>,
    ) -> Option<Duration> {
        if let Some(cached) = self.entries.get(name) {
            if now - cached.computed_at < self.refresh {
                return cached.until;
            }
        }
        let until = search();
        self.entries.insert(
            name.to_string(),
            CachedPass {
                computed_at: now,
                until,
            },
        );
        until
    }

    /// Drops entries for satellites no longer in `satellites`.
    pub fn retain(&mut self, satellites: &[Satellite]) {
        self.entries
            .retain(|name, _| satellites.iter().any(|s| &s.name == name));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn compute_frame(
    ephemeris: &dyn Ephemeris,
    satellites: &[Satellite],
    observer: &Observer,
    now: DateTime<Utc>,
    settings: &FrameSettings,
    passes: &mut NextPassCache,
) -> CachedFrame {
    let scores = scoring::score(ephemeris, satellites, observer, now, &settings.scoring);
    passes.retain(satellites);

    let mut telemetry = Vec::with_capacity(satellites.len());
    let mut next_passes = Vec::with_capacity(satellites.len());
    for satellite in satellites {
        telemetry.push(telemetry_for(ephemeris, satellite, observer, now));
        next_passes.push(passes.lookup(&satellite.name, now, || {
            find_next_pass(
                ephemeris,
                satellite,
                observer,
                now,
                settings.min_pass_elevation_deg,
            )
        }));
    }

    CachedFrame {
        computed_at: now,
        scores,
        telemetry,
        next_passes,
    }
}

fn telemetry_for(
    ephemeris: &dyn Ephemeris,
    satellite: &Satellite,
    observer: &Observer,
    now: DateTime<Utc>,
) -> Option<SatelliteTelemetry> {
    let sky = match ephemeris.position(satellite, observer, now) {
        Ok(sky) => sky,
        Err(e) => {
            log::debug!("No position for {}: {}", satellite.name, e);
            return None;
        }
    };
    let subpoint = ephemeris.subpoint(satellite, now).ok();
    let ground_distance_km =
        subpoint.map(|p| observer.great_circle_km(p.latitude_deg, p.longitude_deg));

    Some(SatelliteTelemetry {
        sky,
        subpoint,
        ground_distance_km,
    })
}
