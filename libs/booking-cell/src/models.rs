// libs/booking-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::auth::{Role, User};

use crate::slots::{SlotKey, SlotsBooked};

// ==============================================================================
// DIRECTORY RECORDS
// ==============================================================================

fn default_available() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub speciality: String,
    #[serde(default = "default_available")]
    pub available: bool,
    pub fees: f64,
    #[serde(default)]
    pub slots_booked: SlotsBooked,
    #[serde(default)]
    pub revision: u64,
}

impl Doctor {
    pub fn snapshot(&self) -> DoctorSnapshot {
        DoctorSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            speciality: self.speciality.clone(),
            fees: self.fees,
        }
    }

    pub fn has_valid_fees(&self) -> bool {
        self.fees.is_finite() && self.fees >= 0.0
    }
}

/// Doctor details copied into an appointment at booking time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DoctorSnapshot {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub speciality: String,
    #[serde(default)]
    pub fees: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

// ==============================================================================
// APPOINTMENT RECORDS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[serde(alias = "_id")]
    pub id: String,
    pub user_id: String,
    pub doc_id: String,
    pub slot_date: String,
    pub slot_time: String,
    #[serde(default)]
    pub user_data: UserProfile,
    #[serde(default)]
    pub doc_data: DoctorSnapshot,
    pub amount: f64,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
}

impl Appointment {
    pub fn slot(&self) -> SlotKey {
        SlotKey::new(self.slot_date.clone(), self.slot_time.clone())
    }

    pub fn state(&self) -> AppointmentState {
        AppointmentState::of(self.cancelled, self.is_completed)
    }
}

/// Fields of an appointment before the store assigns its id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    pub user_id: String,
    pub doc_id: String,
    pub slot_date: String,
    pub slot_time: String,
    pub user_data: UserProfile,
    pub doc_data: DoctorSnapshot,
    pub amount: f64,
    pub cancelled: bool,
    pub is_completed: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
}

impl NewAppointment {
    pub fn for_booking(user: &UserProfile, doctor: &Doctor, slot: &SlotKey, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user.id.clone(),
            doc_id: doctor.id.clone(),
            slot_date: slot.slot_date.clone(),
            slot_time: slot.slot_time.clone(),
            user_data: user.clone(),
            doc_data: doctor.snapshot(),
            amount: doctor.fees,
            cancelled: false,
            is_completed: false,
            date: now,
        }
    }

    pub fn with_id(self, id: String) -> Appointment {
        Appointment {
            id,
            user_id: self.user_id,
            doc_id: self.doc_id,
            slot_date: self.slot_date,
            slot_time: self.slot_time,
            user_data: self.user_data,
            doc_data: self.doc_data,
            amount: self.amount,
            cancelled: self.cancelled,
            is_completed: self.is_completed,
            date: self.date,
        }
    }
}

/// Terminal flag written by cancellation or completion. Stores apply it only
/// while the record is still active.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
}

impl AppointmentUpdate {
    pub fn cancel() -> Self {
        Self {
            cancelled: Some(true),
            is_completed: None,
        }
    }

    pub fn complete() -> Self {
        Self {
            cancelled: None,
            is_completed: Some(true),
        }
    }

    pub fn apply(&self, appointment: &mut Appointment) {
        if let Some(cancelled) = self.cancelled {
            appointment.cancelled = cancelled;
        }
        if let Some(is_completed) = self.is_completed {
            appointment.is_completed = is_completed;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentState {
    Active,
    Cancelled,
    Completed,
}

impl AppointmentState {
    pub fn of(cancelled: bool, is_completed: bool) -> Self {
        if cancelled {
            AppointmentState::Cancelled
        } else if is_completed {
            AppointmentState::Completed
        } else {
            AppointmentState::Active
        }
    }

    pub fn is_terminal(self) -> bool {
        self != AppointmentState::Active
    }
}

// ==============================================================================
// CALLERS AND REQUESTS
// ==============================================================================

/// The verified identity an operation runs on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationRequest {
    pub user_id: String,
    pub doc_id: String,
    pub slot_date: String,
    pub slot_time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookAppointmentRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub doc_id: String,
    #[serde(default)]
    pub slot_date: String,
    #[serde(default)]
    pub slot_time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentActionRequest {
    #[serde(default)]
    pub appointment_id: String,
}

// ==============================================================================
// OUTCOMES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyKind {
    /// A slot hold exists without an active appointment.
    OrphanedHold,
    /// An active appointment has no slot hold.
    MissingHold,
}

/// Describes state left behind that an operator has to reconcile.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationNotice {
    pub kind: InconsistencyKind,
    pub doc_id: String,
    pub slot_date: String,
    pub slot_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<String>,
    pub detail: String,
}

impl ReconciliationNotice {
    pub fn orphaned_hold(
        doc_id: &str,
        slot: &SlotKey,
        appointment_id: Option<&str>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind: InconsistencyKind::OrphanedHold,
            doc_id: doc_id.to_string(),
            slot_date: slot.slot_date.clone(),
            slot_time: slot.slot_time.clone(),
            appointment_id: appointment_id.map(str::to_string),
            detail: detail.into(),
        }
    }
}

/// A committed result, possibly with follow-up work for operators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<ReconciliationNotice>,
}

impl<T> Outcome<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConflictKind {
    #[error("Slot not available")]
    SlotTaken,
    #[error("Doctor not available")]
    DoctorUnavailable,
    #[error("Appointment already cancelled")]
    AlreadyCancelled,
    #[error("Appointment already completed")]
    AlreadyCompleted,
    #[error("Cannot complete a cancelled appointment")]
    CompleteCancelled,
    #[error("Doctor record changed concurrently, retry the repair")]
    RevisionMismatch,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BookingError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(ConflictKind),

    #[error("{0}")]
    Upstream(String),

    #[error("{}", .0.detail)]
    Inconsistent(ReconciliationNotice),
}

impl BookingError {
    pub fn unauthorized_action() -> Self {
        BookingError::Forbidden("Unauthorized action".to_string())
    }
}
