//! Permission-based access control
//!
//! Endpoints declare their access rule when they are registered. The rules
//! live in an [`EndpointPolicies`] table keyed by method and route template,
//! which the pipeline consults before deciding whether to authenticate and
//! authorize a request.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    http::Method,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use crate::{
    models::{Identity, Permission},
    services::stores::PermissionStore,
    utils::AppError,
};

/// What an endpoint requires from its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No authentication
    Public,
    /// Any authenticated identity
    Authenticated,
    /// An authenticated identity holding the permission
    Requires(Permission),
}

/// Access rule attached to one endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointRule {
    pub access: Access,
    /// Emit an audit event after the handler runs
    pub sensitive: bool,
}

impl EndpointRule {
    pub const fn public() -> Self {
        Self {
            access: Access::Public,
            sensitive: false,
        }
    }

    pub const fn authenticated() -> Self {
        Self {
            access: Access::Authenticated,
            sensitive: false,
        }
    }

    pub const fn requires(permission: Permission) -> Self {
        Self {
            access: Access::Requires(permission),
            sensitive: false,
        }
    }

    /// Mark the endpoint as a sensitive action
    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn needs_identity(&self) -> bool {
        !matches!(self.access, Access::Public)
    }

    pub fn required_permission(&self) -> Option<Permission> {
        match self.access {
            Access::Requires(permission) => Some(permission),
            _ => None,
        }
    }
}

/// Route template to rule mapping
#[derive(Debug, Clone, Default)]
pub struct EndpointPolicies {
    rules: HashMap<(Method, String), EndpointRule>,
}

impl EndpointPolicies {
    /// Rule applied to requests that match no registered route
    pub const FALLBACK: EndpointRule = EndpointRule::authenticated();

    pub fn new() -> Self {
        Self::default()
    }

    /// Record the rule for a method and route template
    ///
    /// Registering the same pair twice replaces the earlier rule.
    pub fn insert(&mut self, method: Method, template: impl Into<String>, rule: EndpointRule) {
        self.rules.insert((method, template.into()), rule);
    }

    /// Rule for a method and matched route template
    ///
    /// `HEAD` falls back to the `GET` rule, as the router serves it from the
    /// `GET` handler. `None` for the template (no route matched) or an
    /// unregistered pair yields [`EndpointPolicies::FALLBACK`].
    pub fn rule_for(&self, method: &Method, template: Option<&str>) -> EndpointRule {
        let Some(template) = template else {
            return Self::FALLBACK;
        };
        let lookup = |method: &Method| self.rules.get(&(method.clone(), template.to_string()));

        lookup(method)
            .or_else(|| {
                if *method == Method::HEAD {
                    lookup(&Method::GET)
                } else {
                    None
                }
            })
            .copied()
            .unwrap_or(Self::FALLBACK)
    }

    /// All registered rules, sorted by template then method
    pub fn entries(&self) -> Vec<(Method, String, EndpointRule)> {
        let mut entries: Vec<_> = self
            .rules
            .iter()
            .map(|((method, template), rule)| (method.clone(), template.clone(), *rule))
            .collect();
        entries.sort_by(|a, b| (&a.1, a.0.as_str()).cmp(&(&b.1, b.0.as_str())));
        entries
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Authorization verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny,
}

/// RBAC error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RbacError {
    /// A permission is required but nobody is authenticated
    NotAuthenticated,
    /// User lacks required permission
    PermissionDenied { permission: Permission },
}

impl IntoResponse for RbacError {
    fn into_response(self) -> Response {
        let message = match &self {
            RbacError::NotAuthenticated => "Authentication required".to_string(),
            RbacError::PermissionDenied { permission } => {
                format!("Permission denied: {} required", permission)
            }
        };

        AppError::Forbidden(message).into_response()
    }
}

/// Checks identities against the permission store
#[derive(Clone)]
pub struct PermissionAuthorizer {
    store: Arc<dyn PermissionStore>,
}

impl PermissionAuthorizer {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self { store }
    }

    /// Decide whether `identity` may proceed
    ///
    /// No requirement always allows without touching the store. A requirement
    /// with no identity, a missing grant, or an unreachable store denies.
    pub async fn authorize(
        &self,
        identity: Option<&Identity>,
        required: Option<Permission>,
    ) -> AccessDecision {
        let Some(permission) = required else {
            return AccessDecision::Allow;
        };
        let Some(identity) = identity else {
            return AccessDecision::Deny;
        };

        match self.store.has_grant(identity.subject_id(), permission).await {
            Ok(true) => AccessDecision::Allow,
            Ok(false) => AccessDecision::Deny,
            Err(e) => {
                error!(error = %e, permission = %permission, "Permission lookup failed");
                AccessDecision::Deny
            }
        }
    }

    /// [`PermissionAuthorizer::authorize`] mapped to a rejection
    pub async fn check(
        &self,
        identity: Option<&Identity>,
        required: Option<Permission>,
    ) -> Result<(), RbacError> {
        match self.authorize(identity, required).await {
            AccessDecision::Allow => Ok(()),
            AccessDecision::Deny => {
                let (Some(identity), Some(permission)) = (identity, required) else {
                    return Err(RbacError::NotAuthenticated);
                };
                warn!(
                    subject = identity.subject_id(),
                    permission = %permission,
                    "Permission denied"
                );
                Err(RbacError::PermissionDenied { permission })
            }
        }
    }
}

impl std::fmt::Debug for PermissionAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionAuthorizer").finish_non_exhaustive()
    }
}
