pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod grouping;
pub mod model;
pub mod ports;
pub mod queue;
pub mod repos;
pub mod runtime;
pub mod worker;
pub mod workflow;

pub use broadcast::{StatusBroadcaster, StatusEvent};
pub use config::Config;
pub use error::{CollaboratorError, CookscanError, Result, WorkerError, WorkflowError};
pub use grouping::{group_pages, infer_motif, Motif};
pub use queue::{ClassificationJob, EmbeddingJob};
pub use runtime::{Runtime, RuntimeServices};
pub use workflow::{
    CheckpointStore, MemoryCheckpointStore, ResumeCoordinator, RunOutcome, SqliteCheckpointStore,
};
