//! bpfcat REST API server library
//!
//! The binary in `main.rs` wires config, logging, and the listener; the
//! `api` module holds the router and handlers so integration tests can
//! exercise them against an in-memory database.

pub mod api;
