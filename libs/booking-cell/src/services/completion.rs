// libs/booking-cell/src/services/completion.rs
use tracing::{info, instrument};

use crate::models::{Actor, Appointment, AppointmentUpdate, BookingError};
use crate::services::coordinator::BookingCoordinator;
use crate::services::lifecycle::Transition;

impl BookingCoordinator {
    /// Only the doctor the appointment is booked with may complete it. The
    /// slot stays held.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id, role = %actor.role))]
    pub async fn complete(&self, actor: &Actor, appointment_id: &str) -> Result<Appointment, BookingError> {
        let completed = self
            .apply_transition(actor, appointment_id, Transition::Complete, AppointmentUpdate::complete())
            .await?;

        info!("Appointment {} completed by doctor {}", completed.id, actor.id);
        Ok(completed)
    }
}
