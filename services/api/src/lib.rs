//! services/api/src/lib.rs
//!
//! The `api_lib` library shared by the `api` and `openapi` binaries and the
//! integration tests.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
