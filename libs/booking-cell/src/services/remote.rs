// libs/booking-cell/src/services/remote.rs
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use shared_database::DbServiceClient;

use crate::models::{Appointment, AppointmentUpdate, Doctor, NewAppointment, UserProfile};
use crate::services::directory::{AppointmentStore, DirectoryError, DoctorDirectory, UserDirectory};
use crate::slots::{SlotKey, SlotsBooked};

#[derive(Debug, Deserialize)]
struct ReleaseResult {
    released: bool,
}

#[derive(Debug, Deserialize)]
struct RevisionResult {
    revision: u64,
}

/// Collaborators backed by the database-service HTTP API.
pub struct RemoteDirectory {
    client: DbServiceClient,
}

impl RemoteDirectory {
    pub fn new(client: DbServiceClient) -> Self {
        Self { client }
    }

    fn slot_body(slot: &SlotKey) -> Value {
        json!({
            "slotDate": slot.slot_date,
            "slotTime": slot.slot_time,
        })
    }

    async fn list(&self, filter: &str, value: &str) -> Result<Vec<Appointment>, DirectoryError> {
        let path = format!("/api/appointments?{}={}", filter, urlencoding::encode(value));
        match self.client.request::<Vec<Appointment>>(Method::GET, &path, None).await {
            Ok(appointments) => Ok(appointments),
            // the service answers 404 when nothing matches
            Err(shared_database::DbError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl DoctorDirectory for RemoteDirectory {
    async fn get_doctor(&self, doc_id: &str) -> Result<Doctor, DirectoryError> {
        let path = format!("/api/doctors/{}", urlencoding::encode(doc_id));
        Ok(self.client.request(Method::GET, &path, None).await?)
    }

    async fn reserve_slot(&self, doc_id: &str, slot: &SlotKey) -> Result<(), DirectoryError> {
        let path = format!("/api/doctors/{}/slots/reserve", urlencoding::encode(doc_id));
        let mut body = Self::slot_body(slot);
        // the service answers 412 when the doctor is not available
        body["requireAvailable"] = json!(true);
        let _: Value = self.client.request(Method::POST, &path, Some(body)).await?;
        debug!("Reserved {} for doctor {}", slot, doc_id);
        Ok(())
    }

    async fn release_slot(&self, doc_id: &str, slot: &SlotKey) -> Result<bool, DirectoryError> {
        let path = format!("/api/doctors/{}/slots/release", urlencoding::encode(doc_id));
        let result: ReleaseResult = self
            .client
            .request(Method::POST, &path, Some(Self::slot_body(slot)))
            .await?;
        Ok(result.released)
    }

    async fn update_slots(
        &self,
        doc_id: &str,
        expected_revision: u64,
        slots: &SlotsBooked,
    ) -> Result<u64, DirectoryError> {
        let path = format!("/api/doctors/{}/slots", urlencoding::encode(doc_id));
        let body = json!({
            "slots_booked": slots,
            "expectedRevision": expected_revision,
        });
        let result: RevisionResult = self.client.request(Method::PUT, &path, Some(body)).await?;
        Ok(result.revision)
    }
}

#[async_trait]
impl UserDirectory for RemoteDirectory {
    async fn get_user(&self, user_id: &str) -> Result<UserProfile, DirectoryError> {
        let path = format!("/api/users/{}", urlencoding::encode(user_id));
        Ok(self.client.request(Method::GET, &path, None).await?)
    }
}

#[async_trait]
impl AppointmentStore for RemoteDirectory {
    async fn create(&self, appointment: &NewAppointment) -> Result<Appointment, DirectoryError> {
        let body = serde_json::to_value(appointment)
            .map_err(|e| DirectoryError::Rejected(format!("cannot encode appointment: {}", e)))?;
        Ok(self.client.request(Method::POST, "/api/appointments", Some(body)).await?)
    }

    async fn get(&self, appointment_id: &str) -> Result<Appointment, DirectoryError> {
        let path = format!("/api/appointments/{}", urlencoding::encode(appointment_id));
        Ok(self.client.request(Method::GET, &path, None).await?)
    }

    async fn update(
        &self,
        appointment_id: &str,
        update: &AppointmentUpdate,
    ) -> Result<Appointment, DirectoryError> {
        let path = format!(
            "/api/appointments/{}?expect=active",
            urlencoding::encode(appointment_id)
        );
        let body = json!(update);
        Ok(self.client.request(Method::PUT, &path, Some(body)).await?)
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Appointment>, DirectoryError> {
        self.list("userId", user_id).await
    }

    async fn list_by_doctor(&self, doc_id: &str) -> Result<Vec<Appointment>, DirectoryError> {
        self.list("docId", doc_id).await
    }
}
