//! shell-gateway library
//!
//! Runs allowlisted programs on behalf of untrusted callers: requests are
//! validated (allowlist, shell operators, working directory), executed without
//! a shell under an optional timeout, and reported as a uniform result record.
//! The `mcp` module exposes this as an MCP tool over stdio.

pub mod config;
pub mod mcp;
pub mod metrics;
pub mod metrics_server;
pub mod tools;
