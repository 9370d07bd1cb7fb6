//! Default capabilities: a `geo`-backed validity oracle and simplification
//! kernel, and a spherical mercator projection.

pub mod geo_kernel;
pub mod lazy;
pub mod projection;

pub use geo_kernel::GeoKernel;
pub use lazy::LazyOracle;
pub use projection::SphericalMercator;
