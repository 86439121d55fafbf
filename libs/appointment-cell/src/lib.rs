pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use handlers::AppointmentState;
pub use models::{
    Actor, Appointment, AppointmentError, AppointmentEvent, AppointmentEventKind, AppointmentStatus,
    BookAppointmentRequest, Transition,
};
pub use services::{
    AppointmentEventHandler, AppointmentRegistry, AppointmentStore, EventOutbox, InMemoryAppointmentStore,
    OutboxRelay, SupabaseAppointmentStore,
};
