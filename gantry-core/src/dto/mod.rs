//! Data Transfer Objects for the history API
//!
//! DTOs are the request and response shapes exchanged between the history
//! server and its callers. Domain types are embedded as-is where the caller
//! needs the full record.

pub mod config;
pub mod history;
