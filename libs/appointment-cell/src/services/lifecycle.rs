use tracing::{debug, warn};

use crate::models::{Actor, Appointment, AppointmentError, AppointmentStatus, Transition};

/// Status reached by `action` from `current`, or the conflict it causes.
pub fn next_status(current: AppointmentStatus, action: Transition) -> Result<AppointmentStatus, AppointmentError> {
    let next = match (current, action) {
        (AppointmentStatus::Pending, Transition::Confirm) => AppointmentStatus::Confirmed,
        (AppointmentStatus::Pending, Transition::Reject) => AppointmentStatus::Canceled,
        (AppointmentStatus::Confirmed, Transition::Complete) => AppointmentStatus::Completed,
        (AppointmentStatus::Confirmed, Transition::Cancel) => AppointmentStatus::Canceled,
        _ => {
            warn!("Invalid status transition attempted: {} on {}", action, current);
            return Err(AppointmentError::InvalidStatusTransition { from: current, action });
        }
    };

    debug!("Status transition validated: {} -> {}", current, next);
    Ok(next)
}

/// Actions available from a status. Terminal statuses have none.
pub fn valid_transitions(current: AppointmentStatus) -> Vec<Transition> {
    match current {
        AppointmentStatus::Pending => vec![Transition::Confirm, Transition::Reject],
        AppointmentStatus::Confirmed => vec![Transition::Complete, Transition::Cancel],
        AppointmentStatus::Completed | AppointmentStatus::Canceled => vec![],
    }
}

/// Confirm/reject belong to the assigned doctor, completion to the system,
/// cancellation to either party of the appointment.
pub fn authorize(appointment: &Appointment, action: Transition, actor: Actor) -> Result<(), AppointmentError> {
    let allowed = match (action, actor) {
        (Transition::Confirm | Transition::Reject, Actor::Doctor(id)) => id == appointment.doctor_id,
        (Transition::Complete, Actor::System) => true,
        (Transition::Cancel, Actor::Doctor(id)) => id == appointment.doctor_id,
        (Transition::Cancel, Actor::Patient(id)) => id == appointment.patient_id,
        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        warn!("{} may not {} appointment {}", actor, action, appointment.id);
        Err(AppointmentError::Unauthorized(format!(
            "{} is not permitted to {} this appointment",
            actor, action
        )))
    }
}
