// libs/booking-cell/src/services/consistency.rs
//
// Compares a doctor's slot map with the doctor's active appointments and
// rewrites the map when they disagree. This is the reconciliation path for
// holds left behind by failed compensations or failed releases.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::models::{Appointment, AppointmentState, BookingError, ConflictKind, Doctor};
use crate::services::coordinator::{upstream_failure, with_timeout};
use crate::services::directory::{AppointmentStore, DirectoryError, DoctorDirectory};
use crate::services::validation::validate_identifier;
use crate::slots::{SlotKey, SlotsBooked};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingHold {
    pub appointment_id: String,
    #[serde(flatten)]
    pub slot: SlotKey,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoubleBooking {
    #[serde(flatten)]
    pub slot: SlotKey,
    pub appointment_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    pub doc_id: String,
    pub revision: u64,
    pub active_appointments: usize,
    pub orphaned_holds: Vec<SlotKey>,
    pub missing_holds: Vec<MissingHold>,
    pub double_bookings: Vec<DoubleBooking>,
    pub is_consistent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairResult {
    pub report: ConsistencyReport,
    pub repaired: bool,
    pub released_holds: Vec<SlotKey>,
    pub restored_holds: Vec<SlotKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_revision: Option<u64>,
}

impl RepairResult {
    fn unchanged(report: ConsistencyReport) -> Self {
        Self {
            report,
            repaired: false,
            released_holds: Vec::new(),
            restored_holds: Vec::new(),
            new_revision: None,
        }
    }
}

struct Snapshot {
    doctor: Doctor,
    appointments: Vec<Appointment>,
}

impl Snapshot {
    fn report(&self) -> (ConsistencyReport, SlotsBooked) {
        build_report(
            &self.doctor.id,
            self.doctor.revision,
            &self.doctor.slots_booked,
            &self.appointments,
        )
    }
}

pub struct SlotConsistencyService {
    doctors: Arc<dyn DoctorDirectory>,
    appointments: Arc<dyn AppointmentStore>,
    call_timeout: Duration,
    settle_window: Duration,
}

impl SlotConsistencyService {
    pub fn new(
        doctors: Arc<dyn DoctorDirectory>,
        appointments: Arc<dyn AppointmentStore>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            doctors,
            appointments,
            call_timeout,
            settle_window: call_timeout * 2,
        }
    }

    /// How long an orphaned hold must stay orphaned before repair drops it.
    /// Never less than one and a half call timeouts, so a reservation still
    /// creating its appointment has either finished or given up.
    pub fn with_settle_window(mut self, settle_window: Duration) -> Self {
        self.settle_window = settle_window.max(self.call_timeout + self.call_timeout / 2);
        self
    }

    #[instrument(skip(self))]
    pub async fn check(&self, doc_id: &str) -> Result<ConsistencyReport, BookingError> {
        validate_identifier("docId", doc_id)?;
        let (report, _) = self.snapshot(doc_id).await?.report();
        log_inconsistency(&report);
        Ok(report)
    }

    /// Restores holds missing for active appointments and drops holds that
    /// stay orphaned across the settle window. The write is a single
    /// `update_slots` guarded by the revision of the last read; any slot
    /// change after that read fails the repair with a conflict.
    #[instrument(skip(self))]
    pub async fn repair(&self, doc_id: &str) -> Result<RepairResult, BookingError> {
        validate_identifier("docId", doc_id)?;

        let first = self.snapshot(doc_id).await?;
        let (report, expected) = first.report();
        log_inconsistency(&report);

        if report.is_consistent {
            info!("Slot map of doctor {} already consistent", doc_id);
            return Ok(RepairResult::unchanged(report));
        }

        let (current, expected, released) = if report.orphaned_holds.is_empty() {
            (first, expected, Vec::new())
        } else {
            debug!(
                "Re-reading doctor {} in {:?} before dropping {} orphaned holds",
                doc_id,
                self.settle_window,
                report.orphaned_holds.len()
            );
            tokio::time::sleep(self.settle_window).await;

            let second = self.snapshot(doc_id).await?;
            let (recheck, expected) = second.report();
            let released: Vec<SlotKey> = report
                .orphaned_holds
                .iter()
                .filter(|slot| recheck.orphaned_holds.contains(slot))
                .cloned()
                .collect();
            if released.len() < report.orphaned_holds.len() {
                info!(
                    "{} holds of doctor {} gained an appointment and are kept",
                    report.orphaned_holds.len() - released.len(),
                    doc_id
                );
            }
            (second, expected, released)
        };

        let mut slots = current.doctor.slots_booked.clone();
        for slot in &released {
            slots.remove(slot);
        }
        let restored: Vec<SlotKey> = expected.iter().filter(|slot| !slots.contains(slot)).collect();
        for slot in &restored {
            slots.insert(slot);
        }

        if released.is_empty() && restored.is_empty() {
            info!("Nothing to rewrite for doctor {}", doc_id);
            return Ok(RepairResult::unchanged(report));
        }

        match with_timeout(
            self.call_timeout,
            "slot map update",
            self.doctors.update_slots(doc_id, current.doctor.revision, &slots),
        )
        .await
        {
            Ok(new_revision) => {
                info!(
                    "Repaired slot map of doctor {}: dropped {} orphaned, restored {} missing (revision {})",
                    doc_id,
                    released.len(),
                    restored.len(),
                    new_revision
                );
                Ok(RepairResult {
                    report,
                    repaired: true,
                    released_holds: released,
                    restored_holds: restored,
                    new_revision: Some(new_revision),
                })
            }
            Err(DirectoryError::Conflict(reason)) => {
                warn!("Repair of doctor {} lost a race: {}", doc_id, reason);
                Err(BookingError::Conflict(ConflictKind::RevisionMismatch))
            }
            Err(e) => Err(upstream_failure(e, "Doctor not found")),
        }
    }

    async fn snapshot(&self, doc_id: &str) -> Result<Snapshot, BookingError> {
        // doctor first: an appointment created after this read is still listed
        let doctor = with_timeout(self.call_timeout, "doctor lookup", self.doctors.get_doctor(doc_id))
            .await
            .map_err(|e| upstream_failure(e, "Doctor not found"))?;
        let appointments = with_timeout(
            self.call_timeout,
            "appointment listing",
            self.appointments.list_by_doctor(doc_id),
        )
        .await
        .map_err(|e| upstream_failure(e, "Doctor not found"))?;

        Ok(Snapshot { doctor, appointments })
    }
}

fn log_inconsistency(report: &ConsistencyReport) {
    if !report.is_consistent {
        warn!(
            "Doctor {} slot map inconsistent: {} orphaned, {} missing, {} double-booked",
            report.doc_id,
            report.orphaned_holds.len(),
            report.missing_holds.len(),
            report.double_bookings.len()
        );
    }
}

fn build_report(
    doc_id: &str,
    revision: u64,
    held: &SlotsBooked,
    appointments: &[Appointment],
) -> (ConsistencyReport, SlotsBooked) {
    let mut by_slot: HashMap<SlotKey, Vec<String>> = HashMap::new();
    for appointment in appointments
        .iter()
        .filter(|a| a.doc_id == doc_id && a.state() == AppointmentState::Active)
    {
        by_slot
            .entry(appointment.slot())
            .or_default()
            .push(appointment.id.clone());
    }

    let expected: SlotsBooked = by_slot.keys().cloned().collect();

    let orphaned_holds: Vec<SlotKey> = held.iter().filter(|slot| !expected.contains(slot)).collect();

    let mut missing_holds: Vec<MissingHold> = by_slot
        .iter()
        .filter(|(slot, _)| !held.contains(slot))
        .flat_map(|(slot, ids)| {
            ids.iter().map(move |id| MissingHold {
                appointment_id: id.clone(),
                slot: slot.clone(),
            })
        })
        .collect();
    missing_holds.sort_by(|a, b| a.slot.cmp(&b.slot).then_with(|| a.appointment_id.cmp(&b.appointment_id)));

    let mut double_bookings: Vec<DoubleBooking> = by_slot
        .iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(slot, ids)| {
            let mut appointment_ids = ids.clone();
            appointment_ids.sort();
            DoubleBooking {
                slot: slot.clone(),
                appointment_ids,
            }
        })
        .collect();
    double_bookings.sort_by(|a, b| a.slot.cmp(&b.slot));

    let is_consistent = orphaned_holds.is_empty() && missing_holds.is_empty() && double_bookings.is_empty();
    let active_appointments = by_slot.values().map(Vec::len).sum();

    (
        ConsistencyReport {
            doc_id: doc_id.to_string(),
            revision,
            active_appointments,
            orphaned_holds,
            missing_holds,
            double_bookings,
            is_consistent,
        },
        expected,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::models::{DoctorSnapshot, UserProfile};

    fn appointment(id: &str, time: &str, cancelled: bool) -> Appointment {
        Appointment {
            id: id.to_string(),
            user_id: "u1".to_string(),
            doc_id: "d1".to_string(),
            slot_date: "2024-06-01".to_string(),
            slot_time: time.to_string(),
            user_data: UserProfile::default(),
            doc_data: DoctorSnapshot::default(),
            amount: 20.0,
            cancelled,
            is_completed: false,
            date: Utc::now(),
        }
    }

    #[test]
    fn report_classifies_holds() {
        let held: SlotsBooked = [
            SlotKey::new("2024-06-01", "09:00"),
            SlotKey::new("2024-06-01", "10:00"),
        ]
        .into_iter()
        .collect();
        let appointments = vec![
            appointment("a1", "10:00", false),
            appointment("a2", "11:00", false),
            appointment("a3", "09:00", true),
        ];

        let (report, expected) = build_report("d1", 4, &held, &appointments);

        assert!(!report.is_consistent);
        assert_eq!(report.orphaned_holds, vec![SlotKey::new("2024-06-01", "09:00")]);
        assert_eq!(report.missing_holds.len(), 1);
        assert_eq!(report.missing_holds[0].appointment_id, "a2");
        assert_eq!(report.active_appointments, 2);
        assert_eq!(expected.times("2024-06-01").len(), 2);
        assert!(expected.contains(&SlotKey::new("2024-06-01", "11:00")));
    }

    #[test]
    fn settle_window_outlasts_call_timeout() {
        let store = Arc::new(crate::services::memory::InMemoryStore::new());
        let timeout = Duration::from_millis(300);

        let default = SlotConsistencyService::new(store.clone(), store.clone(), timeout);
        assert_eq!(default.settle_window, Duration::from_millis(600));

        let shortened = SlotConsistencyService::new(store.clone(), store, timeout)
            .with_settle_window(Duration::from_millis(10));
        assert_eq!(shortened.settle_window, Duration::from_millis(450));
    }

    #[test]
    fn two_active_appointments_on_one_slot_are_reported() {
        let held: SlotsBooked = [SlotKey::new("2024-06-01", "10:00")].into_iter().collect();
        let appointments = vec![appointment("a2", "10:00", false), appointment("a1", "10:00", false)];

        let (report, _) = build_report("d1", 1, &held, &appointments);

        assert!(!report.is_consistent);
        assert!(report.orphaned_holds.is_empty());
        assert_eq!(report.double_bookings[0].appointment_ids, vec!["a1", "a2"]);
    }
}
