//! Request gatekeeping pipeline
//!
//! One middleware runs every stage in order: timing start, rate limiting,
//! authentication, authorization, handler, timing stop. The first failing
//! stage produces the response and later stages do not run. Every request is
//! timed and logged, rejected or not.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, info};

use super::{
    auth::{AuthFailure, Authenticator},
    rate_limit::{Admission, RateLimitExceeded, RateLimiter},
    rbac::{EndpointPolicies, EndpointRule, PermissionAuthorizer, RbacError},
};
use crate::models::Identity;

/// Why the pipeline stopped a request
#[derive(Debug)]
pub enum Rejection {
    RateLimited(RateLimitExceeded),
    Unauthenticated(AuthFailure),
    Forbidden(RbacError),
}

impl From<RateLimitExceeded> for Rejection {
    fn from(e: RateLimitExceeded) -> Self {
        Rejection::RateLimited(e)
    }
}

impl From<AuthFailure> for Rejection {
    fn from(e: AuthFailure) -> Self {
        Rejection::Unauthenticated(e)
    }
}

impl From<RbacError> for Rejection {
    fn from(e: RbacError) -> Self {
        Rejection::Forbidden(e)
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        match self {
            Rejection::RateLimited(e) => e.into_response(),
            Rejection::Unauthenticated(e) => e.into_response(),
            Rejection::Forbidden(e) => e.into_response(),
        }
    }
}

/// State of the gatekeeping middleware
#[derive(Clone, Debug)]
pub struct Gatekeeper {
    limiter: RateLimiter,
    authenticator: Authenticator,
    authorizer: PermissionAuthorizer,
    policies: Arc<EndpointPolicies>,
    trust_forwarded_for: bool,
}

impl Gatekeeper {
    pub fn new(
        limiter: RateLimiter,
        authenticator: Authenticator,
        authorizer: PermissionAuthorizer,
        policies: EndpointPolicies,
    ) -> Self {
        Self {
            limiter,
            authenticator,
            authorizer,
            policies: Arc::new(policies),
            trust_forwarded_for: false,
        }
    }

    /// Take the client identifier from `X-Forwarded-For` when present
    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    pub fn policies(&self) -> &EndpointPolicies {
        &self.policies
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Identify the caller for rate limiting
    fn client_id(&self, request: &Request) -> Option<String> {
        if self.trust_forwarded_for {
            let forwarded = request
                .headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(client) = forwarded {
                return Some(client.to_string());
            }
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    }

    /// Run the stages ahead of the handler
    ///
    /// Returns the identity to hand to the handler, if the endpoint needs one.
    async fn admit(
        &self,
        headers: &HeaderMap,
        rule: EndpointRule,
        client: Option<&str>,
    ) -> Result<Option<Identity>, Rejection> {
        if let Some(client) = client {
            if let Admission::Rejected { retry_after_secs } = self.limiter.admit(client) {
                return Err(RateLimitExceeded {
                    retry_after_secs,
                    limit: self.limiter.config().request_limit,
                }
                .into());
            }
        }

        let identity = if rule.needs_identity() {
            Some(self.authenticator.authenticate(headers).await?)
        } else {
            None
        };

        self.authorizer
            .check(identity.as_ref(), rule.required_permission())
            .await?;

        Ok(identity)
    }
}

/// Gatekeeping middleware for Axum
///
/// Must be added with `Router::layer` so the matched route template is
/// available.
pub async fn gatekeeper_middleware(
    State(gate): State<Gatekeeper>,
    mut request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string());
    let rule = gate.policies.rule_for(&method, route.as_deref());
    let client = gate.client_id(&request);

    let outcome = gate.admit(request.headers(), rule, client.as_deref()).await;
    let response = match outcome {
        Ok(identity) => {
            let subject = identity.as_ref().map(Identity::subject_id);
            if let Some(identity) = identity {
                request.extensions_mut().insert(identity);
            }

            debug!(route = route.as_deref().unwrap_or("-"), "Executing action");
            let response = next.run(request).await;
            debug!(
                route = route.as_deref().unwrap_or("-"),
                status = response.status().as_u16(),
                "Executed action"
            );

            if rule.sensitive {
                info!(
                    target: "gatekeeper::audit",
                    method = %method,
                    path = %path,
                    subject = subject,
                    status = response.status().as_u16(),
                    "Sensitive action performed"
                );
            }
            response
        }
        Err(rejection) => {
            match &rejection {
                Rejection::Unauthenticated(reason) => {
                    debug!(reason = ?reason, path = %path, "Authentication failed")
                }
                Rejection::RateLimited(_) | Rejection::Forbidden(_) => {}
            }
            rejection.into_response()
        }
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms,
        client = client.as_deref().unwrap_or("-"),
        "Request for {} took {}ms",
        path,
        elapsed_ms
    );

    response
}
