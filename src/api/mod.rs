//! API routes and handlers
//!
//! Every route is registered through [`GuardedRouter`] together with its
//! access rule, so the routing table and the policy table cannot drift apart.

use axum::{
    handler::Handler,
    http::Method,
    middleware::from_fn_with_state,
    routing::{self, MethodRouter},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    middleware::{
        gatekeeper_middleware, Authenticator, EndpointPolicies, EndpointRule, Gatekeeper,
        PermissionAuthorizer, RateLimiter,
    },
    models::Permission,
    utils::AppError,
    AppState,
};

mod auth;
mod health;
mod products;

pub use health::*;

/// Router builder that records an [`EndpointRule`] per route
pub struct GuardedRouter {
    router: Router<AppState>,
    policies: EndpointPolicies,
}

impl Default for GuardedRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl GuardedRouter {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            policies: EndpointPolicies::new(),
        }
    }

    pub fn get<H, T>(self, path: &str, handler: H, rule: EndpointRule) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        self.add(Method::GET, path, routing::get(handler), rule)
    }

    pub fn post<H, T>(self, path: &str, handler: H, rule: EndpointRule) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        self.add(Method::POST, path, routing::post(handler), rule)
    }

    pub fn put<H, T>(self, path: &str, handler: H, rule: EndpointRule) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        self.add(Method::PUT, path, routing::put(handler), rule)
    }

    pub fn delete<H, T>(self, path: &str, handler: H, rule: EndpointRule) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        self.add(Method::DELETE, path, routing::delete(handler), rule)
    }

    fn add(
        mut self,
        method: Method,
        path: &str,
        method_router: MethodRouter<AppState>,
        rule: EndpointRule,
    ) -> Self {
        self.policies.insert(method, path, rule);
        // Method routers registered on the same path are merged by axum
        self.router = self.router.route(path, method_router);
        self
    }

    pub fn into_parts(self) -> (Router<AppState>, EndpointPolicies) {
        (self.router, self.policies)
    }
}

/// All API routes with their access rules
pub fn routes() -> GuardedRouter {
    GuardedRouter::new()
        .get("/api/health", health::health_check, EndpointRule::public())
        // Token issuance
        .post("/api/users/auth", auth::issue_token, EndpointRule::public())
        .get("/api/users/me", auth::current_user, EndpointRule::authenticated())
        // Product catalogue
        .get(
            "/api/products",
            products::list_products,
            EndpointRule::requires(Permission::ReadProducts),
        )
        .get(
            "/api/products/{id}",
            products::get_product,
            EndpointRule::authenticated().sensitive(),
        )
        .post(
            "/api/products",
            products::create_product,
            EndpointRule::requires(Permission::WriteProducts),
        )
        .put(
            "/api/products/{id}",
            products::update_product,
            EndpointRule::requires(Permission::WriteProducts),
        )
        .delete(
            "/api/products/{id}",
            products::delete_product,
            EndpointRule::requires(Permission::DeleteProducts).sensitive(),
        )
}

async fn not_found() -> AppError {
    AppError::NotFound("No such endpoint".to_string())
}

/// Build the application router with the gatekeeping pipeline applied
pub fn create_router(state: AppState, limiter: RateLimiter) -> Router {
    let (router, policies) = routes().into_parts();

    let gatekeeper = Gatekeeper::new(
        limiter,
        Authenticator::new(state.credentials.clone(), state.token_verifier.clone()),
        PermissionAuthorizer::new(state.permissions.clone()),
        policies,
    )
    .trust_forwarded_for(state.config.server.trust_forwarded_for);

    let cors = if state.config.server.permissive_cors {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    router
        .fallback(not_found)
        .layer(from_fn_with_state(gatekeeper, gatekeeper_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
