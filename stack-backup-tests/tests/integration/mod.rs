//! Integration tests for stack-backup
//!
//! These tests require Docker and run real job containers.
//! Run with: `cargo test -p stack-backup-tests --test integration -- --ignored`

mod filesystem;
