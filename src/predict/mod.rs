mod ephemeris;
mod error;
mod ground_station;
mod pass_finder;
mod tle_loader;
mod types;

pub use ephemeris::{Ephemeris, OrbitEntry, Sgp4Ephemeris};
pub use error::PredictError;
pub use ground_station::Observer;
pub use pass_finder::{find_next_pass, format_next_pass};
pub use tle_loader::{match_satellites, TleCatalog};
pub use types::{EphemerisHandle, Satellite, SkyPosition, Subpoint};
