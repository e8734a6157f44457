mod scorer;

pub use scorer::{score, sigmoid, trackability, ScoreBoard, ScoringParams};
