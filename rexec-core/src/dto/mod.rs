//! Data Transfer Objects for the HTTP API
//!
//! This module contains the request and response bodies exchanged between
//! the server and its clients that are not domain types themselves.

pub mod error;
pub mod job;
pub mod log;
