//! Core domain types
//!
//! These types describe the state of remote jobs. They are produced by the
//! server (which supervises the processes) and consumed by the client and CLI.

pub mod job;
pub mod log;
