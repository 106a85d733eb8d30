//! Suspendable workflow graphs with durable checkpoints.
//!
//! A workflow is a fixed directed graph of named steps over a typed state
//! record. Execution can reach a suspend point, which persists the full
//! state under the instance id and yields; a later resume call carries the
//! human decision back into exactly that step.

pub mod checkpoint;
pub mod classification;
pub mod coordinator;
pub mod engine;
pub mod segmentation;

pub use checkpoint::{Checkpoint, CheckpointStore, MemoryCheckpointStore, SqliteCheckpointStore};
pub use coordinator::ResumeCoordinator;
pub use engine::{Graph, GraphBuilder, GraphRunner, GraphState, RunOutcome, StepOutcome};
