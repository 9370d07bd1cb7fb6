use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use geo_types::Coord;

use crate::traits::{Crs, Projection, ProjectionError};

const EARTH_RADIUS: f64 = 6_378_137.0;
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// EPSG:3857 <-> EPSG:4326 on a sphere
#[derive(Debug, Clone, Copy, Default)]
pub struct SphericalMercator;

impl Projection for SphericalMercator {
    fn transform(&self, coord: Coord<f64>, from: Crs, to: Crs) -> Result<Coord<f64>, ProjectionError> {
        if !coord.x.is_finite() || !coord.y.is_finite() {
            return Err(ProjectionError::OutOfDomain(from));
        }
        match (from, to) {
            (Crs::Wgs84, Crs::Wgs84) | (Crs::WebMercator, Crs::WebMercator) => Ok(coord),
            (Crs::WebMercator, Crs::Wgs84) => Ok(Coord {
                x: (coord.x / EARTH_RADIUS).to_degrees(),
                y: (2.0 * (coord.y / EARTH_RADIUS).exp().atan() - FRAC_PI_2).to_degrees(),
            }),
            (Crs::Wgs84, Crs::WebMercator) => {
                if coord.y.abs() > 90.0 {
                    return Err(ProjectionError::OutOfDomain(Crs::Wgs84));
                }
                let lat = coord.y.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
                Ok(Coord {
                    x: coord.x.to_radians() * EARTH_RADIUS,
                    y: (FRAC_PI_4 + lat / 2.0).tan().ln() * EARTH_RADIUS,
                })
            }
        }
    }
}
