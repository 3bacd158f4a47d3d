// libs/booking-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use shared_models::auth::Role;

use crate::models::{Actor, Appointment, AppointmentState, BookingError, ConflictKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Cancel,
    Complete,
}

impl Transition {
    pub fn target(self) -> AppointmentState {
        match self {
            Transition::Cancel => AppointmentState::Cancelled,
            Transition::Complete => AppointmentState::Completed,
        }
    }
}

/// Active -> Cancelled | Completed. Both targets are terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Who may apply `transition` to `appointment`.
    pub fn authorize(
        &self,
        actor: &Actor,
        appointment: &Appointment,
        transition: Transition,
    ) -> Result<(), BookingError> {
        let allowed = match (transition, actor.role) {
            (Transition::Cancel, Role::Patient) => appointment.user_id == actor.id,
            (Transition::Cancel, Role::Doctor) | (Transition::Complete, Role::Doctor) => {
                appointment.doc_id == actor.id
            }
            _ => false,
        };

        if !allowed {
            warn!(
                "{} {} may not {:?} appointment {}",
                actor.role, actor.id, transition, appointment.id
            );
            return Err(BookingError::unauthorized_action());
        }
        Ok(())
    }

    pub fn validate_transition(
        &self,
        current: AppointmentState,
        transition: Transition,
    ) -> Result<AppointmentState, BookingError> {
        debug!("Validating transition {:?} from {:?}", transition, current);

        let conflict = match (current, transition) {
            (AppointmentState::Active, _) => return Ok(transition.target()),
            (AppointmentState::Cancelled, Transition::Cancel) => ConflictKind::AlreadyCancelled,
            (AppointmentState::Cancelled, Transition::Complete) => ConflictKind::CompleteCancelled,
            (AppointmentState::Completed, _) => ConflictKind::AlreadyCompleted,
        };
        Err(BookingError::Conflict(conflict))
    }

    pub fn get_valid_transitions(&self, current: AppointmentState) -> Vec<Transition> {
        match current {
            AppointmentState::Active => vec![Transition::Cancel, Transition::Complete],
            AppointmentState::Cancelled | AppointmentState::Completed => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::models::{DoctorSnapshot, UserProfile};

    fn appointment() -> Appointment {
        Appointment {
            id: "a1".to_string(),
            user_id: "patient1".to_string(),
            doc_id: "doctor1".to_string(),
            slot_date: "2024-06-01".to_string(),
            slot_time: "10:00".to_string(),
            user_data: UserProfile::default(),
            doc_data: DoctorSnapshot::default(),
            amount: 50.0,
            cancelled: false,
            is_completed: false,
            date: Utc::now(),
        }
    }

    #[test]
    fn owners_may_cancel() {
        let service = AppointmentLifecycleService::new();
        let appt = appointment();

        assert!(service.authorize(&Actor::new("patient1", Role::Patient), &appt, Transition::Cancel).is_ok());
        assert!(service.authorize(&Actor::new("doctor1", Role::Doctor), &appt, Transition::Cancel).is_ok());
        assert!(service.authorize(&Actor::new("doctor1", Role::Doctor), &appt, Transition::Complete).is_ok());
    }

    #[test]
    fn non_owners_and_other_roles_are_forbidden() {
        let service = AppointmentLifecycleService::new();
        let appt = appointment();

        for (actor, transition) in [
            (Actor::new("patient2", Role::Patient), Transition::Cancel),
            (Actor::new("doctor2", Role::Doctor), Transition::Cancel),
            (Actor::new("patient1", Role::Patient), Transition::Complete),
            (Actor::new("admin1", Role::Admin), Transition::Cancel),
            // a doctor id that happens to equal the patient id does not count
            (Actor::new("patient1", Role::Doctor), Transition::Cancel),
        ] {
            assert_eq!(
                service.authorize(&actor, &appt, transition),
                Err(BookingError::unauthorized_action()),
                "{:?} {:?}",
                actor,
                transition
            );
        }
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        let service = AppointmentLifecycleService::new();

        assert_eq!(
            service.validate_transition(AppointmentState::Active, Transition::Complete),
            Ok(AppointmentState::Completed)
        );
        assert_eq!(
            service.validate_transition(AppointmentState::Cancelled, Transition::Cancel),
            Err(BookingError::Conflict(ConflictKind::AlreadyCancelled))
        );
        assert_eq!(
            service.validate_transition(AppointmentState::Cancelled, Transition::Complete),
            Err(BookingError::Conflict(ConflictKind::CompleteCancelled))
        );
        assert_eq!(
            service.validate_transition(AppointmentState::Completed, Transition::Cancel),
            Err(BookingError::Conflict(ConflictKind::AlreadyCompleted))
        );
        assert!(service.get_valid_transitions(AppointmentState::Completed).is_empty());
    }
}
