//! Repository Module
//!
//! Data access layer for the history server.
//! Each repository handles database operations for one group of tables.

pub mod history;
pub mod material;
pub mod pipeline;

// Re-export for convenience
pub use history as history_repository;
pub use material as material_repository;
pub use pipeline as pipeline_repository;
