// libs/booking-cell/src/services/cancellation.rs
use tracing::{error, info, instrument, warn};

use crate::models::{
    Actor, Appointment, AppointmentUpdate, BookingError, Outcome, ReconciliationNotice,
};
use crate::services::coordinator::{upstream_failure, BookingCoordinator};
use crate::services::directory::DirectoryError;
use crate::services::lifecycle::Transition;
use crate::services::validation::validate_identifier;

impl BookingCoordinator {
    /// Marks the appointment cancelled, then frees its slot. The cancellation
    /// stands even when the release fails; the failure comes back as a warning.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id, role = %actor.role))]
    pub async fn cancel(
        &self,
        actor: &Actor,
        appointment_id: &str,
    ) -> Result<Outcome<Appointment>, BookingError> {
        let cancelled = self
            .apply_transition(actor, appointment_id, Transition::Cancel, AppointmentUpdate::cancel())
            .await?;
        info!("Appointment {} cancelled by {} {}", cancelled.id, actor.role, actor.id);

        let slot = cancelled.slot();
        match self
            .guarded("slot release", self.doctors.release_slot(&cancelled.doc_id, &slot))
            .await
        {
            Ok(true) => {
                info!("Released {} of doctor {}", slot, cancelled.doc_id);
                Ok(Outcome::clean(cancelled))
            }
            Ok(false) => {
                warn!(
                    "No hold for {} of doctor {} while cancelling {}",
                    slot, cancelled.doc_id, cancelled.id
                );
                Ok(Outcome::clean(cancelled))
            }
            Err(e) => {
                let notice = ReconciliationNotice::orphaned_hold(
                    &cancelled.doc_id,
                    &slot,
                    Some(&cancelled.id),
                    "Appointment cancelled but the slot could not be released",
                );
                error!(
                    kind = ?notice.kind,
                    "Slot {} of doctor {} still held after cancelling {}: {}",
                    slot, cancelled.doc_id, cancelled.id, e
                );
                Ok(Outcome {
                    value: cancelled,
                    warnings: vec![notice],
                })
            }
        }
    }

    /// Shared by cancellation and completion: load, authorize, check the
    /// state machine, then write the terminal flag conditionally.
    pub(crate) async fn apply_transition(
        &self,
        actor: &Actor,
        appointment_id: &str,
        transition: Transition,
        update: AppointmentUpdate,
    ) -> Result<Appointment, BookingError> {
        validate_identifier("appointmentId", appointment_id)?;

        let appointment = self
            .guarded("appointment lookup", self.appointments.get(appointment_id))
            .await
            .map_err(|e| upstream_failure(e, "Appointment not found"))?;

        self.lifecycle.authorize(actor, &appointment, transition)?;
        self.lifecycle.validate_transition(appointment.state(), transition)?;

        match self
            .guarded("appointment update", self.appointments.update(appointment_id, &update))
            .await
        {
            Ok(updated) => Ok(updated),
            Err(DirectoryError::Conflict(reason)) => {
                warn!("Appointment {} changed concurrently: {}", appointment_id, reason);
                Err(self.classify_concurrent_change(appointment_id, transition).await)
            }
            Err(e) => Err(upstream_failure(e, "Appointment not found")),
        }
    }

    /// The store refused the write because another request already moved the
    /// record to a terminal state; report which one.
    async fn classify_concurrent_change(&self, appointment_id: &str, transition: Transition) -> BookingError {
        match self
            .guarded("appointment lookup", self.appointments.get(appointment_id))
            .await
        {
            Ok(current) => match self.lifecycle.validate_transition(current.state(), transition) {
                Err(conflict) => conflict,
                Ok(_) => BookingError::Upstream(
                    "Appointment store rejected the update for an active appointment".to_string(),
                ),
            },
            Err(e) => upstream_failure(e, "Appointment not found"),
        }
    }
}
