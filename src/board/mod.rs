//! Board identity, liveness, and bounded telemetry history.

/// Fixed-capacity ring buffer for telemetry history.
pub mod history;
pub mod registry;
pub mod types;

pub use registry::BoardRegistry;
pub use types::{Board, BoardId, BoardType, GroupId, PowerSample};
