//! Shared command-line plumbing for the Berth binaries.

pub mod config;
