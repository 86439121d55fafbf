use std::sync::Arc;

use tracing::{info, warn};

use appointment_cell::handlers::AppointmentState;
use appointment_cell::services::{
    AppointmentRegistry, AppointmentStore, EventOutbox, InMemoryAppointmentStore, OutboxRelay,
    SupabaseAppointmentStore,
};
use doctor_cell::handlers::DoctorState;
use doctor_cell::services::{AvailabilityService, DoctorStore, InMemoryDoctorStore, SpecialtyRecommender, SupabaseDoctorStore};
use report_cell::handlers::ReportState;
use report_cell::services::{
    InMemoryPatientContext, InMemoryReportStore, PatientContextSource, ReportCoordinator, ReportStore,
    SupabasePatientContext, SupabaseReportStore,
};
use shared_ai::{ChatCompletionClient, CompletionClient, RetryingClient};
use shared_config::{AppConfig, StorageBackend};
use shared_database::SupabaseClient;
use timeline_cell::handlers::TimelineState;
use timeline_cell::services::{
    InMemoryTimelineStore, ReportLookup, SupabaseTimelineStore, TimelineProjector, TimelineStore,
};

struct Stores {
    doctors: Arc<dyn DoctorStore>,
    appointments: Arc<dyn AppointmentStore>,
    outbox: Arc<dyn EventOutbox>,
    timeline: Arc<dyn TimelineStore>,
    reports: Arc<dyn ReportStore>,
    report_lookup: Arc<dyn ReportLookup>,
    patients: Arc<dyn PatientContextSource>,
}

impl Stores {
    fn memory() -> Self {
        let appointments = Arc::new(InMemoryAppointmentStore::new());
        let reports = Arc::new(InMemoryReportStore::new());
        Self {
            doctors: Arc::new(InMemoryDoctorStore::new()),
            appointments: appointments.clone(),
            outbox: appointments,
            timeline: Arc::new(InMemoryTimelineStore::new()),
            reports: reports.clone(),
            report_lookup: reports,
            patients: Arc::new(InMemoryPatientContext::new()),
        }
    }

    fn supabase(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let appointments = Arc::new(SupabaseAppointmentStore::new(supabase.clone()));
        let reports = Arc::new(SupabaseReportStore::new(supabase.clone()));
        Self {
            doctors: Arc::new(SupabaseDoctorStore::new(supabase.clone())),
            appointments: appointments.clone(),
            outbox: appointments,
            timeline: Arc::new(SupabaseTimelineStore::new(supabase.clone())),
            reports: reports.clone(),
            report_lookup: reports,
            patients: Arc::new(SupabasePatientContext::new(supabase)),
        }
    }
}

/// Per-cell router state plus the outbox relay driven by the binary.
pub struct AppServices {
    pub doctor: Arc<DoctorState>,
    pub appointment: Arc<AppointmentState>,
    pub timeline: Arc<TimelineState>,
    pub report: Arc<ReportState>,
    pub relay: Arc<OutboxRelay>,
}

impl AppServices {
    pub fn build(config: Arc<AppConfig>) -> Self {
        let stores = match config.storage_backend {
            StorageBackend::Supabase => {
                info!("Using Supabase storage at {}", config.supabase_url);
                Stores::supabase(&config)
            }
            StorageBackend::Memory => {
                warn!("Using in-memory storage; data is lost on restart");
                Stores::memory()
            }
        };

        if !config.is_ai_configured() {
            warn!("AI_API_KEY not set, recommendations and reports will fail");
        }
        let ai: Arc<dyn CompletionClient> = Arc::new(RetryingClient::from_config(
            Arc::new(ChatCompletionClient::from_config(&config)),
            &config,
        ));

        let availability = Arc::new(AvailabilityService::new(stores.doctors.clone()));
        let recommender = Arc::new(SpecialtyRecommender::new(ai.clone(), stores.doctors));
        let registry = Arc::new(AppointmentRegistry::new(
            stores.appointments,
            availability.clone(),
            config.booking_policy,
        ));
        let projector = Arc::new(TimelineProjector::new(
            stores.timeline,
            availability.clone(),
            stores.report_lookup,
        ));
        let relay = Arc::new(OutboxRelay::from_config(stores.outbox, &config).with_handler(projector.clone()));
        let coordinator = Arc::new(
            ReportCoordinator::new(
                ai,
                registry.clone(),
                availability.clone(),
                stores.patients,
                stores.reports,
                projector.clone(),
            )
            .with_draft_failure_policy(config.draft_failure_policy),
        );

        Self {
            doctor: Arc::new(DoctorState {
                config: config.clone(),
                availability,
                recommender,
            }),
            appointment: Arc::new(AppointmentState {
                config: config.clone(),
                registry,
                relay: Some(relay.clone()),
            }),
            timeline: Arc::new(TimelineState {
                config: config.clone(),
                projector,
            }),
            report: Arc::new(ReportState { config, coordinator }),
            relay,
        }
    }
}
