//! Gantry Core
//!
//! Core types for the Gantry pipeline history layer.
//!
//! This crate contains:
//! - Domain types: pipeline instances, stages, materials and modifications
//! - DTOs: request/response shapes shared by the server and its callers
//! - Revision ordering across per-material modification lists

pub mod domain;
pub mod dto;
pub mod revision;
