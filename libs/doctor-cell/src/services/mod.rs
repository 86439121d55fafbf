pub mod availability;
pub mod matching;
pub mod slots;
pub mod store;

pub use availability::AvailabilityService;
pub use matching::SpecialtyRecommender;
pub use slots::{default_slots, generate_slots, offerable_slots};
pub use store::{DoctorStore, InMemoryDoctorStore, SupabaseDoctorStore};
