pub mod lifecycle;
pub mod outbox;
pub mod registry;
pub mod store;

pub use outbox::{AppointmentEventHandler, OutboxRelay};
pub use registry::AppointmentRegistry;
pub use store::{AppointmentStore, EventOutbox, InMemoryAppointmentStore, SupabaseAppointmentStore};
