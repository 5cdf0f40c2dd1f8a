//! Resource controllers, the work queue, and the supervisor

pub mod queue;
pub mod supervisor;
pub mod worker;

pub use queue::WorkQueue;
pub use supervisor::Supervisor;
pub use worker::{ControllerSettings, ResourceController};
