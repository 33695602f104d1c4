//! Common test utilities and helpers
//!
//! Fixture repositories are built with git2 and deterministic signatures so
//! both backends can be checked against known commit hashes.

#![allow(dead_code)]

pub mod test_fixtures;
pub mod test_helpers;
