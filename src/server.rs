//! HTTP Server Assembly
//! Mission: Wire stores, the auth gate and handlers into one router

use crate::api;
use crate::auth::{
    api as auth_api, require_role, AccountStore, AuthGate, BcryptHasher, PasswordHasher, Role,
    RoleGuard, TokenIssuer,
};
use crate::error::ServiceError;
use crate::items::{api as items_api, ItemStore};
use crate::middleware::{rate_limit_middleware, request_logging, RateLimitLayer};
use crate::storage::StorageProvider;
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Settings the service needs beyond where its data lives
#[derive(Clone)]
pub struct ServiceSettings {
    pub token_key: Vec<u8>,
    pub token_ttl: chrono::Duration,
    pub bcrypt_cost: u32,
}

impl std::fmt::Debug for ServiceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceSettings")
            .field("token_key", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

/// Shared application state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AuthGate>,
    pub items: Arc<ItemStore>,
}

impl AppState {
    /// Open every collection through `provider` and build the auth gate
    pub fn open(provider: &StorageProvider, settings: &ServiceSettings) -> Result<Self, ServiceError> {
        let hasher: Arc<dyn PasswordHasher> = Arc::new(BcryptHasher::new(settings.bcrypt_cost)?);

        let accounts = Arc::new(AccountStore::open(
            provider.backend("accounts"),
            hasher.clone(),
        )?);
        let tokens = Arc::new(TokenIssuer::open(
            provider.backend("tokens"),
            accounts.clone(),
            &settings.token_key,
            settings.token_ttl,
        )?);
        let gate = Arc::new(AuthGate::new(accounts.clone(), tokens.clone(), hasher)?);
        let items = Arc::new(ItemStore::open(provider.backend("items"))?);

        info!(
            "📦 Loaded {} accounts, {} items, {} active tokens",
            accounts.count(),
            items.count(),
            tokens.active_count()
        );

        Ok(Self { gate, items })
    }
}

/// Build the full router.
///
/// Registration and login sit behind the per-IP rate limiter; item reads need
/// any valid token and item writes need an admin token.
pub fn build_router(state: AppState, limiter: RateLimitLayer) -> Router {
    let reader = middleware::from_fn_with_state(
        RoleGuard::new(state.gate.clone(), Role::Normal),
        require_role,
    );
    let admin = middleware::from_fn_with_state(
        RoleGuard::new(state.gate.clone(), Role::Admin),
        require_role,
    );
    let throttle = middleware::from_fn_with_state(limiter, rate_limit_middleware);

    let credential_routes = Router::new()
        .route("/api/users", post(auth_api::register))
        .route("/api/authenticate", post(auth_api::authenticate))
        .route_layer(throttle);

    let session_routes = Router::new()
        .route("/api/logout", post(auth_api::logout))
        .route("/api/me", get(auth_api::current_session))
        .route_layer(reader.clone());

    let item_routes = Router::new()
        .route(
            "/api/items",
            get(items_api::list_items)
                .route_layer(reader.clone())
                .merge(post(items_api::create_item).route_layer(admin.clone())),
        )
        .route(
            "/api/items/:id",
            get(items_api::get_item)
                .route_layer(reader)
                .merge(put(items_api::update_item).route_layer(admin.clone()))
                .merge(delete(items_api::delete_item).route_layer(admin)),
        );

    Router::new()
        .route("/health", get(api::health_check))
        .merge(credential_routes)
        .merge(session_routes)
        .merge(item_routes)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(request_logging)),
        )
}
