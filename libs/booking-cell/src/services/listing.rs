// libs/booking-cell/src/services/listing.rs
use tracing::{debug, instrument};

use crate::models::{Actor, Appointment, BookingError};
use crate::services::coordinator::BookingCoordinator;
use crate::services::directory::DirectoryError;
use crate::services::validation::validate_identifier;

impl BookingCoordinator {
    /// Appointments booked by the patient, newest first.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn list_for_patient(&self, actor: &Actor) -> Result<Vec<Appointment>, BookingError> {
        validate_identifier("userId", &actor.id)?;
        let appointments = self
            .guarded("appointment listing", self.appointments.list_by_user(&actor.id))
            .await
            .map_err(listing_failure)?;

        debug!("Found {} appointments for user {}", appointments.len(), actor.id);
        Ok(newest_first(appointments))
    }

    /// Appointments booked with the doctor, newest first.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn list_for_doctor(&self, actor: &Actor) -> Result<Vec<Appointment>, BookingError> {
        validate_identifier("docId", &actor.id)?;
        let appointments = self
            .guarded("appointment listing", self.appointments.list_by_doctor(&actor.id))
            .await
            .map_err(listing_failure)?;

        debug!("Found {} appointments for doctor {}", appointments.len(), actor.id);
        Ok(newest_first(appointments))
    }
}

// an empty listing is not an error, so every failure here is upstream
fn listing_failure(err: DirectoryError) -> BookingError {
    BookingError::Upstream(format!("Upstream service unavailable: {}", err))
}

fn newest_first(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
    appointments
}
