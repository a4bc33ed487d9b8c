//! Unit tests for stack-backup
//!
//! These tests exercise single components against mocks and temp dirs.

mod config;
mod verifier;
