// ABOUTME: Library root for sshbatch - exposes the SSH core and config types.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod error;
pub mod output;
pub mod ssh;
