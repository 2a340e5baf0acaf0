//! Step definitions for Cucumber scenarios

pub mod auth_steps;
pub mod authorization_steps;
pub mod rate_limit_steps;
