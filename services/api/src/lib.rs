//! services/api/src/lib.rs
//!
//! Library surface of the `api` service: configuration, adapters for the
//! core ports, the retrying analysis client, and the web layer. The
//! `api` and `openapi` binaries assemble their applications from here.

pub mod adapters;
pub mod analysis;
pub mod config;
pub mod error;
pub mod web;
