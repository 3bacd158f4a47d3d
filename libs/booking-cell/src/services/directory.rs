// libs/booking-cell/src/services/directory.rs
//
// Collaborators the coordinator talks to. Every slot mutation is a single
// conditional operation executed by the owner of the doctor record.

use async_trait::async_trait;
use thiserror::Error;

use shared_database::DbError;

use crate::models::{Appointment, AppointmentUpdate, Doctor, NewAppointment, UserProfile};
use crate::slots::{SlotKey, SlotsBooked};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DirectoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The collaborator answered and refused the request.
    #[error("{0}")]
    Rejected(String),

    /// No answer was received; the request may or may not have been applied.
    #[error("{0}")]
    Unavailable(String),

    #[error("{0} timed out")]
    Timeout(String),

    #[error("invalid collaborator response: {0}")]
    InvalidResponse(String),
}

impl From<DbError> for DirectoryError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(message) => DirectoryError::NotFound(message),
            DbError::Conflict(message) => DirectoryError::Conflict(message),
            DbError::PreconditionFailed(message) => DirectoryError::Precondition(message),
            DbError::Timeout => DirectoryError::Timeout("database-service request".to_string()),
            DbError::Status { status, message } => {
                DirectoryError::Rejected(format!("database-service returned {}: {}", status, message))
            }
            DbError::Rejected(message) => {
                DirectoryError::Rejected(format!("database-service rejected request: {}", message))
            }
            DbError::Transport(message) => DirectoryError::Unavailable(message),
            DbError::InvalidResponse(message) => DirectoryError::InvalidResponse(message),
        }
    }
}

impl DirectoryError {
    /// True when the collaborator definitely did not apply the write. A
    /// timeout, a lost connection or an unreadable answer leaves the outcome
    /// unknown.
    pub fn is_definite_refusal(&self) -> bool {
        matches!(
            self,
            DirectoryError::NotFound(_)
                | DirectoryError::Conflict(_)
                | DirectoryError::Precondition(_)
                | DirectoryError::Rejected(_)
        )
    }
}

#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn get_doctor(&self, doc_id: &str) -> Result<Doctor, DirectoryError>;

    /// Append-if-absent while the doctor is available. `Conflict` when the
    /// slot is already held, `Precondition` when the doctor is not available.
    async fn reserve_slot(&self, doc_id: &str, slot: &SlotKey) -> Result<(), DirectoryError>;

    /// Remove-if-present. `Ok(false)` when there was no hold.
    async fn release_slot(&self, doc_id: &str, slot: &SlotKey) -> Result<bool, DirectoryError>;

    /// Replaces the whole slot map when the stored revision still equals
    /// `expected_revision`; returns the new revision.
    async fn update_slots(
        &self,
        doc_id: &str,
        expected_revision: u64,
        slots: &SlotsBooked,
    ) -> Result<u64, DirectoryError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<UserProfile, DirectoryError>;
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn create(&self, appointment: &NewAppointment) -> Result<Appointment, DirectoryError>;

    async fn get(&self, appointment_id: &str) -> Result<Appointment, DirectoryError>;

    /// Applies `update` only while the record is active; `Conflict` otherwise.
    async fn update(
        &self,
        appointment_id: &str,
        update: &AppointmentUpdate,
    ) -> Result<Appointment, DirectoryError>;

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Appointment>, DirectoryError>;

    async fn list_by_doctor(&self, doc_id: &str) -> Result<Vec<Appointment>, DirectoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answered_failures_are_definite_refusals() {
        let status = DirectoryError::from(DbError::Status {
            status: 500,
            message: "write failed".to_string(),
        });
        assert_eq!(
            status,
            DirectoryError::Rejected("database-service returned 500: write failed".to_string())
        );
        assert!(status.is_definite_refusal());
        assert!(DirectoryError::from(DbError::Rejected("bad payload".to_string())).is_definite_refusal());
        assert!(DirectoryError::from(DbError::PreconditionFailed("unavailable".to_string())).is_definite_refusal());
    }

    #[test]
    fn unanswered_failures_are_ambiguous() {
        assert!(!DirectoryError::from(DbError::Timeout).is_definite_refusal());
        assert!(!DirectoryError::from(DbError::Transport("connection reset".to_string())).is_definite_refusal());
        assert!(!DirectoryError::from(DbError::InvalidResponse("truncated".to_string())).is_definite_refusal());
        assert!(!DirectoryError::Timeout("appointment create".to_string()).is_definite_refusal());
    }
}
