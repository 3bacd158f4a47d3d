// libs/booking-cell/src/services/coordinator.rs
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use shared_config::AppConfig;
use shared_database::{DbError, DbServiceClient};

use crate::models::BookingError;
use crate::services::consistency::SlotConsistencyService;
use crate::services::directory::{AppointmentStore, DirectoryError, DoctorDirectory, UserDirectory};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::memory::InMemoryStore;
use crate::services::remote::RemoteDirectory;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to build database-service client: {0}")]
    Client(#[from] DbError),

    #[error("failed to load embedded seed: {0}")]
    Seed(String),
}

/// Runs reservation, cancellation and completion against the three
/// collaborators. Holds no mutable state of its own.
pub struct BookingCoordinator {
    pub(crate) doctors: Arc<dyn DoctorDirectory>,
    pub(crate) users: Arc<dyn UserDirectory>,
    pub(crate) appointments: Arc<dyn AppointmentStore>,
    pub(crate) lifecycle: AppointmentLifecycleService,
    pub(crate) call_timeout: Duration,
}

impl BookingCoordinator {
    pub fn new(
        doctors: Arc<dyn DoctorDirectory>,
        users: Arc<dyn UserDirectory>,
        appointments: Arc<dyn AppointmentStore>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            doctors,
            users,
            appointments,
            lifecycle: AppointmentLifecycleService::new(),
            call_timeout,
        }
    }

    /// All three collaborators served by one embedded store.
    pub fn with_store(store: Arc<InMemoryStore>, call_timeout: Duration) -> Self {
        Self::new(store.clone(), store.clone(), store, call_timeout)
    }

    pub fn remote(config: &AppConfig) -> Result<Self, DbError> {
        let directory = Arc::new(RemoteDirectory::new(DbServiceClient::new(config)?));
        Ok(Self::new(
            directory.clone(),
            directory.clone(),
            directory,
            config.request_timeout(),
        ))
    }

    /// Picks the remote database-service when one is configured, otherwise an
    /// embedded store (seeded from `embedded_seed_path` if set).
    pub async fn from_config(config: &AppConfig) -> Result<Self, SetupError> {
        if !config.uses_embedded_store() {
            info!("Booking coordinator using database-service");
            return Ok(Self::remote(config)?);
        }

        let store = Arc::new(InMemoryStore::new());
        if !config.embedded_seed_path.trim().is_empty() {
            let loaded = store
                .load_seed_file(config.embedded_seed_path.trim())
                .await
                .map_err(SetupError::Seed)?;
            info!("Embedded store seeded with {} doctors and {} users", loaded.doctors, loaded.users);
        } else {
            warn!("Embedded store started empty");
        }

        Ok(Self::with_store(store, config.request_timeout()))
    }

    pub fn consistency(&self) -> SlotConsistencyService {
        SlotConsistencyService::new(self.doctors.clone(), self.appointments.clone(), self.call_timeout)
    }

    pub(crate) async fn guarded<T, F>(&self, call: &'static str, fut: F) -> Result<T, DirectoryError>
    where
        F: Future<Output = Result<T, DirectoryError>>,
    {
        with_timeout(self.call_timeout, call, fut).await
    }
}

/// Bounds one collaborator call. An elapsed timer is reported as
/// `DirectoryError::Timeout` and never retried.
pub(crate) async fn with_timeout<T, F>(limit: Duration, call: &'static str, fut: F) -> Result<T, DirectoryError>
where
    F: Future<Output = Result<T, DirectoryError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!("{} timed out after {:?}", call, limit);
            Err(DirectoryError::Timeout(call.to_string()))
        }
    }
}

/// Maps a collaborator failure that has no operation-specific meaning.
pub(crate) fn upstream_failure(err: DirectoryError, not_found: &str) -> BookingError {
    match err {
        DirectoryError::NotFound(_) => BookingError::NotFound(not_found.to_string()),
        other => BookingError::Upstream(format!("Upstream service unavailable: {}", other)),
    }
}
