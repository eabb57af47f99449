//! Core domain types
//!
//! This module contains the domain structures describing recorded pipeline runs.
//! They are produced by the store gateway, enriched and cached by the history
//! repository, and serialized unchanged by the HTTP layer.

pub mod instance;
pub mod material;
pub mod pipeline;
