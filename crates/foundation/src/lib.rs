pub mod bounds;
pub mod geo;
pub mod geometry;
pub mod ids;
pub mod math;
pub mod time;

// Foundation crate: small, well-tested primitives only.
pub use bounds::*;
pub use geo::*;
pub use geometry::*;
pub use ids::*;
pub use time::*;
