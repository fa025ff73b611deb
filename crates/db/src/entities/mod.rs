//! Database entities.

pub mod account;
pub mod complaint;
pub mod incident;

pub use account::Entity as Account;
pub use complaint::Entity as Complaint;
pub use incident::Entity as Incident;
