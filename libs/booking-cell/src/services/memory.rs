// libs/booking-cell/src/services/memory.rs
use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentUpdate, Doctor, NewAppointment, UserProfile};
use crate::services::directory::{AppointmentStore, DirectoryError, DoctorDirectory, UserDirectory};
use crate::slots::{SlotKey, SlotsBooked};

/// Doctors and users to preload into an embedded store.
#[derive(Debug, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub doctors: Vec<Doctor>,
    #[serde(default)]
    pub users: Vec<UserProfile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub doctors: usize,
    pub users: usize,
}

/// Process-local implementation of all three collaborators. Each operation
/// takes one write guard, so the conditional slot and appointment updates are
/// atomic with respect to each other.
#[derive(Default)]
pub struct InMemoryStore {
    doctors: RwLock<HashMap<String, Doctor>>,
    users: RwLock<HashMap<String, UserProfile>>,
    appointments: RwLock<HashMap<String, Appointment>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_doctor(&self, doctor: Doctor) {
        self.doctors.write().await.insert(doctor.id.clone(), doctor);
    }

    pub async fn insert_user(&self, user: UserProfile) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    pub async fn set_fees(&self, doc_id: &str, fees: f64) -> Result<(), DirectoryError> {
        let mut doctors = self.doctors.write().await;
        let doctor = doctors.get_mut(doc_id).ok_or_else(|| doctor_not_found(doc_id))?;
        doctor.fees = fees;
        doctor.revision += 1;
        Ok(())
    }

    pub async fn set_available(&self, doc_id: &str, available: bool) -> Result<(), DirectoryError> {
        let mut doctors = self.doctors.write().await;
        let doctor = doctors.get_mut(doc_id).ok_or_else(|| doctor_not_found(doc_id))?;
        doctor.available = available;
        doctor.revision += 1;
        Ok(())
    }

    pub async fn appointment_count(&self) -> usize {
        self.appointments.read().await.len()
    }

    pub async fn load_seed(&self, seed: Seed) -> SeedSummary {
        let summary = SeedSummary {
            doctors: seed.doctors.len(),
            users: seed.users.len(),
        };
        for doctor in seed.doctors {
            self.insert_doctor(doctor).await;
        }
        for user in seed.users {
            self.insert_user(user).await;
        }
        summary
    }

    pub async fn load_seed_file(&self, path: &str) -> Result<SeedSummary, String> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("cannot read {}: {}", path, e))?;
        let seed: Seed = serde_json::from_str(&raw).map_err(|e| format!("cannot parse {}: {}", path, e))?;
        info!("Loading embedded seed from {}", path);
        Ok(self.load_seed(seed).await)
    }
}

fn doctor_not_found(doc_id: &str) -> DirectoryError {
    DirectoryError::NotFound(format!("doctor {}", doc_id))
}

fn appointment_not_found(appointment_id: &str) -> DirectoryError {
    DirectoryError::NotFound(format!("appointment {}", appointment_id))
}

#[async_trait]
impl DoctorDirectory for InMemoryStore {
    async fn get_doctor(&self, doc_id: &str) -> Result<Doctor, DirectoryError> {
        self.doctors
            .read()
            .await
            .get(doc_id)
            .cloned()
            .ok_or_else(|| doctor_not_found(doc_id))
    }

    async fn reserve_slot(&self, doc_id: &str, slot: &SlotKey) -> Result<(), DirectoryError> {
        let mut doctors = self.doctors.write().await;
        let doctor = doctors.get_mut(doc_id).ok_or_else(|| doctor_not_found(doc_id))?;

        if !doctor.available {
            return Err(DirectoryError::Precondition(format!("doctor {} is not available", doc_id)));
        }
        if !doctor.slots_booked.insert(slot) {
            return Err(DirectoryError::Conflict(format!("slot {} already held", slot)));
        }
        doctor.revision += 1;
        debug!("Held {} for doctor {} (revision {})", slot, doc_id, doctor.revision);
        Ok(())
    }

    async fn release_slot(&self, doc_id: &str, slot: &SlotKey) -> Result<bool, DirectoryError> {
        let mut doctors = self.doctors.write().await;
        let doctor = doctors.get_mut(doc_id).ok_or_else(|| doctor_not_found(doc_id))?;

        let released = doctor.slots_booked.remove(slot);
        if released {
            doctor.revision += 1;
        }
        Ok(released)
    }

    async fn update_slots(
        &self,
        doc_id: &str,
        expected_revision: u64,
        slots: &SlotsBooked,
    ) -> Result<u64, DirectoryError> {
        let mut doctors = self.doctors.write().await;
        let doctor = doctors.get_mut(doc_id).ok_or_else(|| doctor_not_found(doc_id))?;

        if doctor.revision != expected_revision {
            return Err(DirectoryError::Conflict(format!(
                "revision is {}, expected {}",
                doctor.revision, expected_revision
            )));
        }
        doctor.slots_booked = slots.clone();
        doctor.revision += 1;
        Ok(doctor.revision)
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn get_user(&self, user_id: &str) -> Result<UserProfile, DirectoryError> {
        self.users
            .read()
            .await
            .get(user_id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(format!("user {}", user_id)))
    }
}

#[async_trait]
impl AppointmentStore for InMemoryStore {
    async fn create(&self, appointment: &NewAppointment) -> Result<Appointment, DirectoryError> {
        let id = Uuid::new_v4().simple().to_string();
        let record = appointment.clone().with_id(id.clone());
        self.appointments.write().await.insert(id, record.clone());
        Ok(record)
    }

    async fn get(&self, appointment_id: &str) -> Result<Appointment, DirectoryError> {
        self.appointments
            .read()
            .await
            .get(appointment_id)
            .cloned()
            .ok_or_else(|| appointment_not_found(appointment_id))
    }

    async fn update(
        &self,
        appointment_id: &str,
        update: &AppointmentUpdate,
    ) -> Result<Appointment, DirectoryError> {
        let mut appointments = self.appointments.write().await;
        let record = appointments
            .get_mut(appointment_id)
            .ok_or_else(|| appointment_not_found(appointment_id))?;

        if record.state().is_terminal() {
            return Err(DirectoryError::Conflict(format!(
                "appointment {} is {:?}",
                appointment_id,
                record.state()
            )));
        }
        update.apply(record);
        Ok(record.clone())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Appointment>, DirectoryError> {
        Ok(self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_by_doctor(&self, doc_id: &str) -> Result<Vec<Appointment>, DirectoryError> {
        Ok(self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.doc_id == doc_id)
            .cloned()
            .collect())
    }
}
