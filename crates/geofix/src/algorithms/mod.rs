pub mod rings;
pub mod structure;
pub mod resolver;
pub mod topology;
pub mod decompose;
pub mod simplification;

pub use rings::*;
pub use structure::validate;
pub use resolver::*;
pub use topology::*;
pub use decompose::*;
pub use simplification::*;
