use std::sync::Arc;

use axum::{routing::get, Router};

use booking_cell::{booking_routes, BookingCoordinator};
use shared_config::AppConfig;

pub fn create_router(config: Arc<AppConfig>, coordinator: Arc<BookingCoordinator>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic booking coordinator is running!" }))
        .merge(booking_routes(config, coordinator))
}
