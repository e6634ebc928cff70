//! Geolocation codec for `AT-MSGEO` fixes.
//!
//! The transceiver reports its approximate position as Earth-centred
//! Cartesian coordinates in kilometres, plus the network time of the fix.
//! The position comes from the satellite beam footprint and is only good to
//! a few tens of kilometres.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::time::{self, Era};

/// A decoded geolocation fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoFix {
    /// Latitude in degrees, north positive.
    pub latitude: f64,
    /// Longitude in degrees, east positive.
    pub longitude: f64,
    /// When the fix was taken.
    pub fix_time: DateTime<Utc>,
}

/// Convert Cartesian coordinates (km) to latitude/longitude in degrees.
///
/// The polar angle from the z axis is measured from the north pole, so it
/// is subtracted from 90 to give latitude. Longitude uses the two-argument
/// arctangent, which resolves the quadrant when `x` is negative.
///
/// Returns `None` for the origin, which has no defined direction.
pub fn cartesian_to_lat_lon(x: i32, y: i32, z: i32) -> Option<(f64, f64)> {
    let (x, y, z) = (f64::from(x), f64::from(y), f64::from(z));
    let r = (x * x + y * y + z * z).sqrt();
    if r == 0.0 {
        return None;
    }

    let latitude = 90.0 - (z / r).acos().to_degrees();
    let longitude = y.atan2(x).to_degrees();
    Some((latitude, longitude))
}

/// Decode a full `AT-MSGEO` fix.
pub fn decode_fix(x: i32, y: i32, z: i32, fix_ticks_hex: &str, era: Era) -> Result<GeoFix> {
    let (latitude, longitude) = cartesian_to_lat_lon(x, y, z).ok_or_else(|| {
        Error::malformed("-MSGEO", format!("{x},{y},{z},{fix_ticks_hex}"))
    })?;
    let fix_time = time::decode(fix_ticks_hex, era)?;

    Ok(GeoFix {
        latitude,
        longitude,
        fix_time,
    })
}
