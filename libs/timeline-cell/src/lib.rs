pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use handlers::TimelineState;
pub use models::{ConfirmedAppointment, EventKind, GeneratedReport, NewTimelineEvent, TimelineError, TimelineEvent};
pub use services::{InMemoryTimelineStore, NoReports, ReportLookup, SupabaseTimelineStore, TimelineProjector, TimelineStore};
