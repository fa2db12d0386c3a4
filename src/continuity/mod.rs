pub mod probe;
pub mod types;

pub use probe::ContinuityProbe;
pub use types::{Continuity, ContinuityCounts, ContinuityReading, ContinuitySnapshot};
