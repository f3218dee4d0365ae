//! Rexec Core
//!
//! Core types shared by the Rexec server, client and CLI.
//!
//! This crate contains:
//! - Domain types: jobs, their status snapshots and captured log lines
//! - DTOs: request/response bodies exchanged over the HTTP API

pub mod domain;
pub mod dto;
