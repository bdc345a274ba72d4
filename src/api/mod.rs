pub mod accounts;
pub mod events;
pub mod health;
pub mod totals;

use crate::config::Config;
use crate::db::Repository;
use crate::orchestration::Dispatcher;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            repo,
            config,
            dispatcher,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/events", post(events::post_event))
        .route("/v1/sweep", post(events::post_sweep))
        .route("/v1/accounts/:address", get(accounts::get_account))
        .route(
            "/v1/accounts/:address/positions",
            get(accounts::get_account_positions),
        )
        .route("/v1/totals", get(totals::get_totals))
        .route("/v1/totals/recompute", post(totals::recompute_totals))
        .layer(cors)
        .with_state(state)
}
