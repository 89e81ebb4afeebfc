pub mod point_list;
pub mod region_collection;

pub use point_list::*;
pub use region_collection::*;
