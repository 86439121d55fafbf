pub mod projector;
pub mod store;

pub use projector::{NoReports, ReportLookup, TimelineProjector};
pub use store::{InMemoryTimelineStore, SupabaseTimelineStore, TimelineStore};
