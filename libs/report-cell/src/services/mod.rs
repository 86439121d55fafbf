pub mod context;
pub mod coordinator;
pub mod dispatch;
pub mod prompts;
pub mod store;

pub use context::{InMemoryPatientContext, PatientContextSource, SupabasePatientContext};
pub use coordinator::ReportCoordinator;
pub use dispatch::{LoggingDispatcher, NotificationDispatcher};
pub use store::{InMemoryReportStore, ReportStore, SupabaseReportStore};
