pub mod event_bus;
pub mod guard;
pub mod metrics;
pub mod scheduler;
pub mod timer;

pub use event_bus::*;
pub use guard::*;
pub use metrics::*;
pub use scheduler::*;
pub use timer::*;
