// libs/booking-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, BookingState};
use crate::services::coordinator::BookingCoordinator;

pub fn booking_routes(config: Arc<AppConfig>, coordinator: Arc<BookingCoordinator>) -> Router {
    let state = BookingState { coordinator };

    let user_routes = Router::new()
        .route("/book-appointment", post(handlers::book_appointment))
        .route("/cancel-appointment", post(handlers::cancel_patient_appointment))
        .route("/list-appointments", get(handlers::list_patient_appointments));

    let doctor_routes = Router::new()
        .route("/cancel-appointment", post(handlers::cancel_doctor_appointment))
        .route("/complete-appointment", post(handlers::complete_appointment))
        .route("/appointments", get(handlers::list_doctor_appointments));

    let admin_routes = Router::new()
        .route("/consistency/{doc_id}", get(handlers::check_slot_consistency))
        .route("/consistency/{doc_id}/repair", post(handlers::repair_slot_consistency));

    // Every booking operation requires a verified identity
    Router::new()
        .nest("/user", user_routes)
        .nest("/doctor", doctor_routes)
        .nest("/admin", admin_routes)
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
