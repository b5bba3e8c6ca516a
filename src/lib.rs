//! unimock — programmable HTTP mock server.
//!
//! Incoming requests are resolved in two layers: explicit request/response
//! scenarios (from the YAML config or the `/_uni/scenarios` management API)
//! take priority; everything else falls through to a generic CRUD-over-HTTP
//! mock store governed by configured sections.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod fixture;
pub mod management;
pub mod pattern;
pub mod scenario;
pub mod section;
pub mod store;
