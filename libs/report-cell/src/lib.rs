//! Visit reports: patient context, AI summary and prescription draft,
//! persistence, and delivery.

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use handlers::ReportState;
pub use models::{Channel, Contact, GenerateReportRequest, PatientContext, Report, ReportError, SendReportRequest};
pub use router::report_routes;
pub use services::{
    InMemoryPatientContext, InMemoryReportStore, LoggingDispatcher, NotificationDispatcher, PatientContextSource,
    ReportCoordinator, ReportStore, SupabasePatientContext, SupabaseReportStore,
};
