//! Task module - the unit of work driven through the editorial pipeline.
//!
//! This module is designed with explicit state transitions in mind:
//! - Stages and statuses are closed enums with exhaustive matching
//! - Ordering rules are enforced by `Task::check_ready` before any mutation
//! - Pure state changes are separated from IO (persistence lives in `store`)

mod stage;
pub mod task;

pub use stage::Stage;
pub use task::{objective_id, Task, TaskError, TaskId, TaskStatus};
