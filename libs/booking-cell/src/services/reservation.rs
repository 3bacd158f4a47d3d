// libs/booking-cell/src/services/reservation.rs
use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::models::{
    Appointment, BookingError, ConflictKind, NewAppointment, ReconciliationNotice, ReservationRequest,
};
use crate::services::coordinator::{upstream_failure, BookingCoordinator};
use crate::services::directory::DirectoryError;
use crate::services::validation::validate_reservation;
use crate::slots::SlotKey;

impl BookingCoordinator {
    /// Holds the slot first, then records the appointment. A create the store
    /// refused releases the hold again. A create with an unknown outcome, or a
    /// release that fails, keeps the hold and reports `Inconsistent` for
    /// reconciliation.
    #[instrument(skip(self, request), fields(user_id = %request.user_id, doc_id = %request.doc_id))]
    pub async fn reserve(&self, request: ReservationRequest) -> Result<Appointment, BookingError> {
        let slot = validate_reservation(&request)?;

        let doctor = self
            .guarded("doctor lookup", self.doctors.get_doctor(&request.doc_id))
            .await
            .map_err(|e| upstream_failure(e, "Doctor not found"))?;

        if !doctor.available {
            warn!("Doctor {} is not taking appointments", doctor.id);
            return Err(BookingError::Conflict(ConflictKind::DoctorUnavailable));
        }

        if doctor.slots_booked.contains(&slot) {
            warn!("Slot {} already booked for doctor {}", slot, doctor.id);
            return Err(BookingError::Conflict(ConflictKind::SlotTaken));
        }

        if !doctor.has_valid_fees() {
            error!("Doctor {} has invalid fees {}", doctor.id, doctor.fees);
            return Err(BookingError::Upstream("Doctor record has invalid fees".to_string()));
        }

        let user = self
            .guarded("user lookup", self.users.get_user(&request.user_id))
            .await
            .map_err(|e| upstream_failure(e, "User not found"))?;

        match self
            .guarded("slot reservation", self.doctors.reserve_slot(&doctor.id, &slot))
            .await
        {
            Ok(()) => info!("Slot {} held for doctor {}", slot, doctor.id),
            Err(DirectoryError::Conflict(reason)) => {
                warn!("Lost race for slot {} of doctor {}: {}", slot, doctor.id, reason);
                return Err(BookingError::Conflict(ConflictKind::SlotTaken));
            }
            Err(DirectoryError::Precondition(reason)) => {
                warn!("Doctor {} became unavailable before the hold: {}", doctor.id, reason);
                return Err(BookingError::Conflict(ConflictKind::DoctorUnavailable));
            }
            Err(e) => return Err(upstream_failure(e, "Doctor not found")),
        }

        let new_appointment = NewAppointment::for_booking(&user, &doctor, &slot, Utc::now());

        match self
            .guarded("appointment create", self.appointments.create(&new_appointment))
            .await
        {
            Ok(appointment) => {
                info!(
                    "Appointment {} booked for user {} with doctor {} at {}",
                    appointment.id, appointment.user_id, appointment.doc_id, slot
                );
                Ok(appointment)
            }
            Err(cause) => Err(self.compensate_hold(&doctor.id, &slot, cause).await),
        }
    }

    async fn compensate_hold(&self, doc_id: &str, slot: &SlotKey, cause: DirectoryError) -> BookingError {
        if !cause.is_definite_refusal() {
            // the appointment may exist; releasing would reopen its slot
            let notice = ReconciliationNotice::orphaned_hold(
                doc_id,
                slot,
                None,
                format!(
                    "Appointment outcome unknown ({}); slot {} stays held, reconcile doctor {}",
                    cause, slot, doc_id
                ),
            );
            error!(
                kind = ?notice.kind,
                "Kept hold {} for doctor {} after create with unknown outcome: {}",
                slot, doc_id, cause
            );
            return BookingError::Inconsistent(notice);
        }

        warn!("Appointment create refused after holding {} for doctor {}: {}", slot, doc_id, cause);

        match self
            .guarded("slot release", self.doctors.release_slot(doc_id, slot))
            .await
        {
            Ok(released) => {
                if !released {
                    warn!("Compensation found no hold for {} of doctor {}", slot, doc_id);
                }
                info!("Released {} of doctor {} after failed create", slot, doc_id);
                BookingError::Upstream(format!("Failed to save appointment: {}", cause))
            }
            Err(release_err) => {
                let notice = ReconciliationNotice::orphaned_hold(
                    doc_id,
                    slot,
                    None,
                    format!(
                        "Appointment was not saved and slot {} is still held; reconcile doctor {}",
                        slot, doc_id
                    ),
                );
                error!(
                    kind = ?notice.kind,
                    "Orphaned slot hold {} for doctor {}: create failed ({}), release failed ({})",
                    slot, doc_id, cause, release_err
                );
                BookingError::Inconsistent(notice)
            }
        }
    }
}
