use geo_types::Coord;
use tracing::debug;

use crate::{
    config::Config,
    coords::bbox_diagonal,
    traits::{Crs, Projection},
};

/// Snaps coordinates reported by an oracle back onto real source vertices.
///
/// Oracles often work on a reprojected or precision-reduced copy of the
/// geometry, so the points they report rarely match an input vertex exactly.
#[derive(Debug, Clone)]
pub struct CoordinateResolver {
    pub snap_fraction: f64,
    pub snap_fallback: f64,
}

impl Default for CoordinateResolver {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl CoordinateResolver {
    pub fn new(snap_fraction: f64, snap_fallback: f64) -> Self {
        Self {
            snap_fraction,
            snap_fallback,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.snap_fraction, config.snap_fallback)
    }

    /// Largest snap distance accepted for vertices of `tree`
    pub fn threshold(&self, tree: &[Coord<f64>]) -> f64 {
        bbox_diagonal(tree)
            .map(|diagonal| diagonal * self.snap_fraction)
            .unwrap_or(self.snap_fallback)
    }

    /// Nearest vertex of `primary` or `alternate` within that tree's threshold,
    /// otherwise `raw` unchanged. Ties go to the primary tree.
    pub fn resolve(
        &self,
        raw: Coord<f64>,
        primary: &[Coord<f64>],
        alternate: Option<&[Coord<f64>]>,
    ) -> Coord<f64> {
        let mut best: Option<(f64, Coord<f64>)> = None;

        for tree in std::iter::once(primary).chain(alternate) {
            let threshold = self.threshold(tree);
            let Some((distance, vertex)) = nearest(raw, tree) else {
                continue;
            };
            if distance > threshold {
                continue;
            }
            if best.is_none_or(|(best_distance, _)| distance < best_distance) {
                best = Some((distance, vertex));
            }
        }

        match best {
            Some((distance, vertex)) => {
                debug!(?raw, ?vertex, distance, "Snapped reported coordinate to vertex");
                vertex
            }
            None => raw,
        }
    }
}

fn nearest(target: Coord<f64>, tree: &[Coord<f64>]) -> Option<(f64, Coord<f64>)> {
    tree.iter()
        .map(|c| ((c.x - target.x).hypot(c.y - target.y), *c))
        .min_by(|a, b| a.0.total_cmp(&b.0))
}

/// Whether a pair fits inside longitude/latitude bounds
pub fn is_geographic(coord: Coord<f64>) -> bool {
    coord.x.abs() <= 180.0 && coord.y.abs() <= 90.0
}

/// Express a coordinate in EPSG:4326.
///
/// Pairs inside geographic bounds are taken as already geographic; anything
/// else is assumed to be in `projected_frame`. A failed transform keeps the
/// coordinate as given.
pub fn canonicalize(coord: Coord<f64>, projection: &dyn Projection, projected_frame: Crs) -> Coord<f64> {
    if is_geographic(coord) {
        return coord;
    }
    match projection.transform(coord, projected_frame, Crs::Wgs84) {
        Ok(geographic) => geographic,
        Err(e) => {
            debug!(?coord, error = %e, "Could not canonicalize coordinate");
            coord
        }
    }
}
