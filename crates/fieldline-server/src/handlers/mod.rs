pub mod appointments;
pub mod audit;
pub mod consent;
pub mod jobs;
pub mod privacy;
pub mod technicians;
pub mod triage;
