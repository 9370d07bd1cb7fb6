use std::sync::{Arc, OnceLock};

use geo_types::Coord;
use geojson::Geometry;
use tracing::{debug, warn};

use crate::traits::{OracleError, ValidationError, ValidityOracle};

type OracleInit = Box<dyn Fn() -> Option<Arc<dyn ValidityOracle>> + Send + Sync>;

/// Validity oracle that is loaded on first use.
///
/// The initialiser runs at most once. If it yields nothing every call
/// reports [`OracleError::Unavailable`], which the diagnostics surface as
/// unknown validity.
pub struct LazyOracle {
    init: OracleInit,
    loaded: OnceLock<Option<Arc<dyn ValidityOracle>>>,
}

impl LazyOracle {
    pub fn new<F>(init: F) -> Self
    where
        F: Fn() -> Option<Arc<dyn ValidityOracle>> + Send + Sync + 'static,
    {
        Self {
            init: Box::new(init),
            loaded: OnceLock::new(),
        }
    }

    fn oracle(&self) -> Result<&Arc<dyn ValidityOracle>, OracleError> {
        self.loaded
            .get_or_init(|| {
                let oracle = (self.init)();
                match oracle {
                    Some(_) => debug!("Validity oracle loaded"),
                    None => warn!("Validity oracle failed to load, validity will be reported as unknown"),
                }
                oracle
            })
            .as_ref()
            .ok_or(OracleError::Unavailable)
    }

    /// Whether the oracle has been loaded successfully (forces loading)
    pub fn is_available(&self) -> bool {
        self.oracle().is_ok()
    }
}

impl std::fmt::Debug for LazyOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyOracle")
            .field("loaded", &self.loaded.get().map(Option::is_some))
            .finish()
    }
}

impl ValidityOracle for LazyOracle {
    fn is_valid(&self, geometry: &Geometry) -> Result<bool, OracleError> {
        self.oracle()?.is_valid(geometry)
    }

    fn is_simple(&self, geometry: &Geometry) -> Result<bool, OracleError> {
        self.oracle()?.is_simple(geometry)
    }

    fn validation_error(&self, geometry: &Geometry) -> Result<Option<ValidationError>, OracleError> {
        self.oracle()?.validation_error(geometry)
    }

    fn find_self_intersections(&self, geometry: &Geometry) -> Result<Vec<Coord<f64>>, OracleError> {
        self.oracle()?.find_self_intersections(geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::GeoKernel;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn point() -> Geometry {
        Geometry::new(geojson::Value::Point(vec![1.0, 2.0]))
    }

    #[test]
    fn test_loads_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let oracle = LazyOracle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(Arc::new(GeoKernel) as Arc<dyn ValidityOracle>)
        });

        assert_eq!(oracle.is_valid(&point()), Ok(true));
        assert_eq!(oracle.is_simple(&point()), Ok(true));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_load_is_unavailable() {
        let oracle = LazyOracle::new(|| None);
        assert!(!oracle.is_available());
        assert_eq!(oracle.is_valid(&point()), Err(OracleError::Unavailable));
    }
}
