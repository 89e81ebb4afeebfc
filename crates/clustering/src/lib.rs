pub mod cluster;
pub mod config;
pub mod decluster;
pub mod engine;
pub mod error;
pub mod heat;
pub mod overlap;
pub mod point;
pub mod region;
pub mod region_index;
pub mod session;
pub mod stable;
pub mod tier;
pub mod viewport;

pub use cluster::*;
pub use config::*;
pub use decluster::*;
pub use engine::*;
pub use error::*;
pub use point::*;
pub use region_index::*;
pub use session::*;
pub use stable::*;
pub use tier::*;
pub use viewport::*;
