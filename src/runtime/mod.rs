pub mod http;
pub mod noop;
pub mod routing;
pub mod traits;

pub use http::HttpRuntimeClient;
pub use noop::NoopRuntime;
pub use routing::{WorkerCandidate, WorkerHealth, pick_worker};
pub use traits::{RuntimeSessions, SessionProbe};
