//! `TaskFlow` — terminal task list with realtime sync and local fallback.

pub mod app;
pub mod config;
pub mod mirror;
pub mod remote;
pub mod store;
pub mod ui;
