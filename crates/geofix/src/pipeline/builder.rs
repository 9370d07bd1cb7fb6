use std::{path::Path, sync::Arc};

use crate::{
    config::Config,
    error::Result,
    kernel::{GeoKernel, LazyOracle, SphericalMercator},
    pipeline::Pipeline,
    traits::{Crs, GeometryKernel, Projection, ValidityOracle},
};

/// Whether a capability was set, explicitly removed or left to the default
enum Slot<T: ?Sized> {
    Default,
    Absent,
    Set(Arc<T>),
}

impl<T: ?Sized> Slot<T> {
    fn resolve(self, default: impl FnOnce() -> Arc<T>) -> Option<Arc<T>> {
        match self {
            Slot::Default => Some(default()),
            Slot::Absent => None,
            Slot::Set(value) => Some(value),
        }
    }
}

/// Builder for creating pipelines with a fluent API
pub struct PipelineBuilder {
    oracle: Slot<dyn ValidityOracle>,
    kernel: Slot<dyn GeometryKernel>,
    projection: Option<Arc<dyn Projection>>,
    config: Config,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            oracle: Slot::Default,
            kernel: Slot::Default,
            projection: None,
            config: Config::default(),
        }
    }

    /// Set the validity oracle (replaces the default one)
    pub fn with_oracle<O>(mut self, oracle: O) -> Self
    where
        O: ValidityOracle + 'static,
    {
        self.oracle = Slot::Set(Arc::new(oracle));
        self
    }

    /// Share an oracle that is already behind an `Arc`
    pub fn with_shared_oracle(mut self, oracle: Arc<dyn ValidityOracle>) -> Self {
        self.oracle = Slot::Set(oracle);
        self
    }

    /// Use an oracle that is loaded the first time it is needed
    pub fn with_lazy_oracle<F>(self, init: F) -> Self
    where
        F: Fn() -> Option<Arc<dyn ValidityOracle>> + Send + Sync + 'static,
    {
        self.with_oracle(LazyOracle::new(init))
    }

    /// Run diagnostics without an oracle; validity is then reported as unknown
    pub fn without_oracle(mut self) -> Self {
        self.oracle = Slot::Absent;
        self
    }

    /// Set the simplification kernel (replaces the default one)
    pub fn with_kernel<K>(mut self, kernel: K) -> Self
    where
        K: GeometryKernel + 'static,
    {
        self.kernel = Slot::Set(Arc::new(kernel));
        self
    }

    /// Simplify by rounding only
    pub fn without_kernel(mut self) -> Self {
        self.kernel = Slot::Absent;
        self
    }

    /// Set the projection used to canonicalize coordinates
    pub fn with_projection<P>(mut self, projection: P) -> Self
    where
        P: Projection + 'static,
    {
        self.projection = Some(Arc::new(projection));
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Load the configuration from a `.toml` or `.json` file
    pub fn with_config_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        Ok(self.with_config(Config::from_file(path)?))
    }

    /// Override the 0.001 default. Coordinates are still rounded to 3 decimals.
    pub fn with_simplify_tolerance(mut self, tolerance: f64) -> Self {
        self.config.simplify_tolerance = tolerance;
        self
    }

    /// Project geometries into `frame` before the oracle checks them
    pub fn with_working_frame(mut self, frame: Crs) -> Self {
        self.config.working_frame = Some(frame);
        self
    }

    /// Build the pipeline with default components if not specified
    pub fn build(self) -> Pipeline {
        let oracle = self.oracle.resolve(|| Arc::new(GeoKernel) as Arc<dyn ValidityOracle>);
        let kernel = self.kernel.resolve(|| Arc::new(GeoKernel) as Arc<dyn GeometryKernel>);
        let projection = self
            .projection
            .unwrap_or_else(|| Arc::new(SphericalMercator) as Arc<dyn Projection>);

        Pipeline::new(oracle, kernel, projection, self.config)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Validity;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BOWTIE: &str = r#"{"type":"Polygon","coordinates":[[[0,0],[1,1],[1,0],[0,1],[0,0]]]}"#;

    #[test]
    fn test_defaults() {
        let pipeline = PipelineBuilder::new().build();
        assert_eq!(pipeline.config(), &Config::default());
        assert_eq!(pipeline.diagnose(BOWTIE)[0].validity, Some(Validity::Invalid));
    }

    #[test]
    fn test_lazy_oracle_loads_once() {
        static LOADS: AtomicUsize = AtomicUsize::new(0);
        let pipeline = PipelineBuilder::new()
            .with_lazy_oracle(|| {
                LOADS.fetch_add(1, Ordering::SeqCst);
                Some(Arc::new(GeoKernel) as Arc<dyn ValidityOracle>)
            })
            .build();

        pipeline.diagnose(BOWTIE);
        pipeline.diagnose(BOWTIE);
        assert_eq!(LOADS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_lazy_oracle_is_unknown() {
        let pipeline = PipelineBuilder::new().with_lazy_oracle(|| None).build();
        assert_eq!(pipeline.diagnose(BOWTIE)[0].validity, Some(Validity::Unknown));
    }

    #[test]
    fn test_without_kernel_only_rounds() {
        let pipeline = PipelineBuilder::new().without_kernel().build();
        let outcome = pipeline.simplify(r#"{"type":"LineString","coordinates":[[0,0],[0,0],[1,1]]}"#);
        assert!(!outcome.modified);
    }

    #[test]
    fn test_config_overrides() {
        let pipeline = PipelineBuilder::new()
            .with_simplify_tolerance(0.5)
            .with_working_frame(Crs::WebMercator)
            .build();
        assert_eq!(pipeline.config().simplify_tolerance, 0.5);
        assert_eq!(pipeline.config().working_frame, Some(Crs::WebMercator));
    }
}
