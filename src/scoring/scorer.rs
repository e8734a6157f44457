use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::predict::{Ephemeris, Observer, PredictError, Satellite};

/// Tuning of the trackability score.
///
/// The defaults only produce human-readable magnitudes; they carry no physical meaning.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringParams {
    pub gain: f64,
    pub midpoint_deg: f64,
    pub slope_deg: f64,
    pub lookahead_samples: usize,
    #[serde(deserialize_with = "crate::config::parse_duration")]
    pub lookahead_step: StdDuration,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            gain: 19265.0,
            midpoint_deg: 10.0,
            slope_deg: 5.0,
            lookahead_samples: 10,
            lookahead_step: StdDuration::from_secs(30),
        }
    }
}

/// Scores aligned with the satellite set they were computed for.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreBoard {
    pub scores: Vec<f64>,
    pub best: Option<usize>,
}

impl ScoreBoard {
    pub fn score(&self, index: usize) -> f64 {
        self.scores.get(index).copied().unwrap_or(0.0)
    }

    /// Indices of trackable satellites, highest score first. Equal scores keep load order.
    pub fn ranked(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.scores.len())
            .filter(|&i| self.scores[i] > 0.0)
            .collect();
        indices.sort_by(|&a, &b| self.scores[b].total_cmp(&self.scores[a]));
        indices
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Trackability of one satellite from its current elevation, its mean elevation
/// over the look-ahead window and its slant range.
pub fn trackability(
    current_el: f64,
    avg_future_el: f64,
    distance_km: f64,
    params: &ScoringParams,
) -> f64 {
    if current_el <= 0.0 {
        return 0.0;
    }
    let distance_factor = if distance_km > 0.0 {
        1.0 / distance_km.sqrt()
    } else {
        0.01
    };
    let score = params.gain
        * sigmoid((current_el - params.midpoint_deg) / params.slope_deg)
        * sigmoid((avg_future_el - params.midpoint_deg) / params.slope_deg)
        * distance_factor;
    if score.is_finite() && score > 0.0 {
        score
    } else {
        0.0
    }
}

/// Scores every satellite at `now`. Satellites whose propagation fails score zero.
pub fn score(
    ephemeris: &dyn Ephemeris,
    satellites: &[Satellite],
    observer: &Observer,
    now: DateTime<Utc>,
    params: &ScoringParams,
) -> ScoreBoard {
    let mut board = ScoreBoard {
        scores: Vec::with_capacity(satellites.len()),
        best: None,
    };
    let mut best_score = 0.0;

    for (index, satellite) in satellites.iter().enumerate() {
        let value = match score_one(ephemeris, satellite, observer, now, params) {
            Ok(v) => v,
            Err(e) => {
                log::debug!("Scoring {} failed: {}", satellite.name, e);
                0.0
            }
        };
        if value > best_score {
            best_score = value;
            board.best = Some(index);
        }
        board.scores.push(value);
    }

    board
}

fn score_one(
    ephemeris: &dyn Ephemeris,
    satellite: &Satellite,
    observer: &Observer,
    now: DateTime<Utc>,
    params: &ScoringParams,
) -> Result<f64, PredictError> {
    let current = ephemeris.position(satellite, observer, now)?;
    if current.elevation_deg <= 0.0 {
        return Ok(0.0);
    }

    let step = Duration::milliseconds(params.lookahead_step.as_millis() as i64);
    let avg_future_el = if params.lookahead_samples == 0 {
        current.elevation_deg
    } else {
        let mut total = 0.0;
        for i in 0..params.lookahead_samples {
            let at = now + step * i as i32;
            total += ephemeris.position(satellite, observer, at)?.elevation_deg;
        }
        total / params.lookahead_samples as f64
    };

    Ok(trackability(
        current.elevation_deg,
        avg_future_el,
        current.distance_km,
        params,
    ))
}
