pub mod config;
pub mod domain {
    pub mod audit;
    pub mod bulk;
    pub mod context;
    pub mod escrow;
    pub mod payment;
    pub mod user;
}
pub mod error;
pub mod gateways;
pub mod http {
    pub mod actor;
    pub mod extract;
    pub mod handlers {
        pub mod audit;
        pub mod ops;
        pub mod payments;
        pub mod users;
        pub mod webhooks;
    }
    pub mod middleware {
        pub mod admin_auth;
        pub mod rate_limit;
    }
    pub mod routes;
}
pub mod repo;
pub mod service;

use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub payment_service: service::payment_service::PaymentService,
    pub user_service: service::user_service::UserService,
    pub bulk_actions: service::bulk_actions::BulkActionProcessor,
    pub audit_log: Arc<dyn repo::AuditLogStore>,
    pub redis_client: Option<redis::Client>,
}
