pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use handlers::DoctorState;
pub use models::{Availability, DayOfWeek, DaySlots, Doctor, DoctorError, SpecialtyRecommendation, TimeRange};
pub use services::{AvailabilityService, DoctorStore, InMemoryDoctorStore, SpecialtyRecommender, SupabaseDoctorStore};
