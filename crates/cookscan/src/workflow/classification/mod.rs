//! Classification workflow: nine steps, three review checkpoints, one
//! validation cycle.

pub mod driver;
pub mod graph;
pub mod nodes;
pub mod state;

pub use driver::{ClassificationDriver, ClassificationServices};
pub use graph::{classification_graph, NAMESPACE};
pub use state::{ClassificationContext, ClassificationPatch, ClassificationState};
