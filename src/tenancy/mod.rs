pub mod repository;
pub mod types;

pub use types::{AgentRecord, AgentStatus, Board, Organization};
