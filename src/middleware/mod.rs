//! Middleware components
//!
//! This module contains the request gatekeeping stages:
//! - Authentication (Basic and Bearer)
//! - Authorization (per-endpoint permission rules)
//! - Rate limiting (per-client fixed window)
//! - The pipeline that runs them in order and times every request

pub mod auth;
pub mod pipeline;
pub mod rate_limit;
pub mod rbac;

pub use auth::{parse_authorization, AuthFailure, Authenticator, Credentials};
pub use pipeline::{gatekeeper_middleware, Gatekeeper, Rejection};
pub use rate_limit::{spawn_rate_limit_cleanup, Admission, RateLimitConfig, RateLimiter};
pub use rbac::{
    Access, AccessDecision, EndpointPolicies, EndpointRule, PermissionAuthorizer, RbacError,
};
