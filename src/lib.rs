//! Satellite tracking for a two-axis az/el rotator.
//!
//! Satellites are ranked by how well they can be followed right now, the chosen
//! one is mapped onto the rotator's travel, and moves between targets glide
//! instead of jumping.

pub mod config;
pub mod predict;
pub mod rotator;
pub mod scoring;
pub mod tracker;

#[cfg(test)]
mod test_support;
