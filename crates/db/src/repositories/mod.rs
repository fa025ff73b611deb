//! Repository layer for database operations.

mod account;
mod complaint;
mod incident;

pub use account::AccountRepository;
pub use complaint::ComplaintRepository;
pub use incident::{IncidentRepository, VolunteerChange};
