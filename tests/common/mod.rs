//! Common test utilities and helpers
//!
//! This module provides shared test infrastructure including:
//! - Test fixtures (users, grants, request bodies)
//! - Spy and failing collaborators
//! - Captured log events
//! - API test client

#![allow(dead_code)]

pub mod fixtures;
pub mod logs;

pub use fixtures::*;
pub use logs::*;
pub use mocks::*;
pub use test_app::*;
