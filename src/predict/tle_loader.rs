use std::collections::HashSet;
use std::fs;
use std::path::Path;

use sgp4::{Constants, Elements};

use crate::predict::ephemeris::{OrbitEntry, Sgp4Ephemeris};
use crate::predict::{EphemerisHandle, PredictError, Satellite};

pub struct TleEntry {
    pub name: String,
    pub norad_id: u32,
    pub elements: Elements,
    pub constants: Constants,
}

/// Satellites parsed from one TLE file, or from every `.tle`/`.txt` file of a directory.
pub struct TleCatalog {
    entries: Vec<TleEntry>,
}

impl TleCatalog {
    pub fn load(path: &Path) -> Result<Self, PredictError> {
        if !path.exists() {
            return Err(PredictError::FileNotFound(path.display().to_string()));
        }

        let mut entries = Vec::new();
        if path.is_dir() {
            for entry in fs::read_dir(path)? {
                let file = entry?.path();
                let is_tle = file
                    .extension()
                    .map(|ext| ext == "tle" || ext == "txt")
                    .unwrap_or(false);
                if file.is_file() && is_tle {
                    entries.extend(Self::load_file(&file)?.entries);
                }
            }
        } else {
            entries = Self::load_file(path)?.entries;
        }

        let catalog = Self { entries }.deduplicated();
        if catalog.entries.is_empty() {
            return Err(PredictError::NoSatellites);
        }
        log::info!("Loaded {} satellites from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    fn load_file(path: &Path) -> Result<Self, PredictError> {
        let content = fs::read_to_string(path)?;
        let filename = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        Ok(Self::parse(&content, &filename))
    }

    /// Parses TLE text. Entries sgp4 rejects are skipped with a warning.
    pub fn parse(content: &str, source: &str) -> Self {
        let mut entries = Vec::new();

        for (name, line1, line2) in parse_multi_tle(content) {
            match build_entry(name, &line1, &line2, source) {
                Ok(entry) => entries.push(entry),
                Err(e) => log::warn!("Skipping satellite: {}", e),
            }
        }

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Splits the catalogue into the satellite list and the propagator that serves it.
    pub fn into_ephemeris(self) -> (Vec<Satellite>, Sgp4Ephemeris) {
        let mut satellites = Vec::with_capacity(self.entries.len());
        let mut orbits = Vec::with_capacity(self.entries.len());

        for (index, entry) in self.entries.into_iter().enumerate() {
            satellites.push(Satellite {
                name: entry.name,
                norad_id: entry.norad_id,
                handle: EphemerisHandle(index),
            });
            orbits.push(OrbitEntry {
                elements: entry.elements,
                constants: entry.constants,
            });
        }

        (satellites, Sgp4Ephemeris::new(orbits))
    }

    fn deduplicated(self) -> Self {
        let mut seen = HashSet::new();
        let entries = self
            .entries
            .into_iter()
            .filter(|e| seen.insert(e.name.clone()))
            .collect();
        Self { entries }
    }
}

/// Picks every satellite whose name contains one of `names` (case-insensitive),
/// in request order, each at most once, capped at `max`.
///
/// Returns the selection and the requested names that matched nothing.
pub fn match_satellites(
    all: &[Satellite],
    names: &[String],
    max: usize,
) -> (Vec<Satellite>, Vec<String>) {
    let mut picked: Vec<Satellite> = Vec::new();
    let mut missing = Vec::new();

    for wanted in names {
        let needle = wanted.trim().to_uppercase();
        let mut found = false;
        for sat in all {
            if sat.name.to_uppercase().contains(&needle) && !picked.iter().any(|p| p.name == sat.name) {
                picked.push(sat.clone());
                found = true;
            }
        }
        if !found {
            missing.push(wanted.clone());
        }
    }

    picked.truncate(max);
    (picked, missing)
}

fn build_entry(
    name: Option<String>,
    line1: &str,
    line2: &str,
    source: &str,
) -> Result<TleEntry, PredictError> {
    let invalid = |message: String| PredictError::InvalidTle {
        file: source.to_string(),
        message,
    };

    let elements = Elements::from_tle(name.clone(), line1.as_bytes(), line2.as_bytes())
        .map_err(|e| invalid(e.to_string()))?;
    let constants = Constants::from_elements(&elements).map_err(|e| invalid(e.to_string()))?;
    let name = name.unwrap_or_else(|| format!("NORAD {}", elements.norad_id));

    Ok(TleEntry {
        name,
        norad_id: elements.norad_id as u32,
        elements,
        constants,
    })
}

/// Parse multi-satellite TLE content
fn parse_multi_tle(content: &str) -> Vec<(Option<String>, String, String)> {
    let lines: Vec<&str> = content
        .lines()
        .map(|l| l.trim_start_matches('\u{feff}').trim())
        .filter(|l| !l.is_empty())
        .collect();

    let mut result = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].starts_with("1 ") && i + 1 < lines.len() && lines[i + 1].starts_with("2 ") {
            // 2-line TLE (no name)
            result.push((None, lines[i].to_string(), lines[i + 1].to_string()));
            i += 2;
        } else if i + 2 < lines.len()
            && lines[i + 1].starts_with("1 ")
            && lines[i + 2].starts_with("2 ")
        {
            result.push((
                Some(lines[i].to_string()),
                lines[i + 1].to_string(),
                lines[i + 2].to_string(),
            ));
            i += 3;
        } else {
            i += 1;
        }
    }

    result
}
