// libs/booking-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use tracing::debug;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{
    Actor, AppointmentActionRequest, BookAppointmentRequest, BookingError, Outcome,
    ReconciliationNotice, ReservationRequest,
};
use crate::services::coordinator::BookingCoordinator;

#[derive(Clone)]
pub struct BookingState {
    pub coordinator: Arc<BookingCoordinator>,
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Validation(msg) => AppError::ValidationError(msg),
            BookingError::NotFound(msg) => AppError::NotFound(msg),
            BookingError::Forbidden(msg) => AppError::Forbidden(msg),
            BookingError::Conflict(kind) => AppError::Conflict(kind.to_string()),
            BookingError::Upstream(msg) => AppError::ExternalService(msg),
            BookingError::Inconsistent(notice) => AppError::Inconsistent(notice.detail),
        }
    }
}

fn with_warnings(mut body: Value, warnings: &[ReconciliationNotice]) -> Value {
    if let Some(first) = warnings.first() {
        body["warning"] = json!(first.detail);
        body["reconciliation"] = json!(warnings);
    }
    body
}

// ==============================================================================
// PATIENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<BookingState>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Patient)?;

    // a patient can only book for themselves
    if let Some(body_user_id) = request.user_id.as_deref() {
        if !body_user_id.is_empty() && body_user_id != user.id {
            return Err(BookingError::unauthorized_action().into());
        }
    }

    let appointment = state
        .coordinator
        .reserve(ReservationRequest {
            user_id: user.id.clone(),
            doc_id: request.doc_id,
            slot_date: request.slot_date,
            slot_time: request.slot_time,
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment Booked",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn cancel_patient_appointment(
    State(state): State<BookingState>,
    Extension(user): Extension<User>,
    Json(request): Json<AppointmentActionRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Patient)?;
    cancel_as(&state, &user, &request.appointment_id).await
}

#[axum::debug_handler]
pub async fn list_patient_appointments(
    State(state): State<BookingState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Patient)?;

    let appointments = state.coordinator.list_for_patient(&Actor::from(&user)).await?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments
    })))
}

// ==============================================================================
// DOCTOR HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn cancel_doctor_appointment(
    State(state): State<BookingState>,
    Extension(user): Extension<User>,
    Json(request): Json<AppointmentActionRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Doctor)?;
    cancel_as(&state, &user, &request.appointment_id).await
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<BookingState>,
    Extension(user): Extension<User>,
    Json(request): Json<AppointmentActionRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Doctor)?;

    let appointment = state
        .coordinator
        .complete(&Actor::from(&user), &request.appointment_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment Completed",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn list_doctor_appointments(
    State(state): State<BookingState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Doctor)?;

    let appointments = state.coordinator.list_for_doctor(&Actor::from(&user)).await?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments
    })))
}

async fn cancel_as(state: &BookingState, user: &User, appointment_id: &str) -> Result<Json<Value>, AppError> {
    let Outcome { value, warnings } = state
        .coordinator
        .cancel(&Actor::from(user), appointment_id)
        .await?;

    Ok(Json(with_warnings(
        json!({
            "success": true,
            "message": "Appointment Cancelled",
            "appointment": value
        }),
        &warnings,
    )))
}

// ==============================================================================
// ADMIN HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn check_slot_consistency(
    State(state): State<BookingState>,
    Extension(user): Extension<User>,
    Path(doc_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Admin)?;
    debug!("Admin {} checking slot map of doctor {}", user.id, doc_id);

    let report = state.coordinator.consistency().check(&doc_id).await?;

    Ok(Json(json!({
        "success": true,
        "report": report
    })))
}

#[axum::debug_handler]
pub async fn repair_slot_consistency(
    State(state): State<BookingState>,
    Extension(user): Extension<User>,
    Path(doc_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Admin)?;

    let result = state.coordinator.consistency().repair(&doc_id).await?;
    let message = if result.repaired {
        "Slot map repaired"
    } else if result.report.is_consistent {
        "Slot map already consistent"
    } else {
        "No hold could be safely changed"
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "repair": result
    })))
}
