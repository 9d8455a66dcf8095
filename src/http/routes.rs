use crate::http::handlers::{audit, ops, payments, users, webhooks};
use crate::http::middleware::{admin_auth, rate_limit};
use crate::AppState;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

pub struct RouterOptions {
    pub internal_api_key: String,
    pub rate_limit: Option<rate_limit::RateLimitState>,
}

pub fn build_router(state: AppState, opts: RouterOptions) -> Router {
    let internal_routes = Router::new()
        .route("/internal/audit/:entity_type/:entity_id", get(audit::entity_trail))
        .layer(from_fn_with_state(
            opts.internal_api_key,
            admin_auth::require_internal_api_key,
        ));

    let api = Router::new()
        .route("/api/payments", get(payments::list_payments))
        .route("/api/payments/create", post(payments::create_payment))
        .route("/api/payments/methods", get(payments::supported_methods))
        .route("/api/payments/bkash", post(payments::bkash_action))
        .route("/api/payments/nagad", post(payments::nagad_action))
        .route("/api/payments/:payment_id/refund", post(payments::refund_payment))
        .route("/api/payments/:payment_id/escrow", get(payments::payment_escrow))
        .route("/api/payments/:payment_id/escrow/release", post(payments::release_escrow))
        .route("/api/payments/webhooks/:provider", post(webhooks::receive))
        .route(
            "/api/users",
            get(users::list_users)
                .post(users::create_user)
                .put(users::update_user)
                .patch(users::bulk_action)
                .delete(users::deactivate_user),
        )
        .merge(internal_routes);

    let api = match opts.rate_limit {
        Some(limits) => api.layer(from_fn_with_state(limits, rate_limit::enforce)),
        None => api,
    };

    Router::new()
        .route("/health", get(payments::health))
        .route("/ops/readiness", get(ops::readiness))
        .route("/ops/liveness", get(ops::liveness))
        .merge(api)
        .with_state(state)
}
