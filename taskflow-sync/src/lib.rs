//! `TaskFlow` sync server library.
//!
//! Exposes the document-sync server for use in tests and embedding. The
//! server owns the authoritative task collection, accepts WebSocket
//! subscribers, applies their writes, and pushes the complete collection
//! to every subscriber after each change.

pub mod collection;
pub mod config;
pub mod server;
