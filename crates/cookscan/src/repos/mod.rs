//! Repository implementations bundled with the crate.
//!
//! Production deployments are expected to wire their own persistence
//! behind the repository ports; the in-memory variants here back the test
//! suite and local experimentation.

pub mod memory;

pub use memory::{
    MemoryBookRepository, MemoryPageRepository, MemoryRecipeRepository, MemoryRecordRepository,
};
