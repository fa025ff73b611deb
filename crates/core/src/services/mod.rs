//! Business logic services.

pub mod account;
pub mod complaint;
pub mod incident;
pub mod lifecycle;
pub mod notifier;

pub use account::{
    AccountService, LoginView, ProfileUpdate, ProfileView, SignupForm, SignupOutcome,
    SignupRequest, UploadedImage,
};
pub use complaint::{ComplaintService, CreateComplaintInput};
pub use incident::{
    CreateIncidentInput, CreatedIncident, IncidentService, IncidentStatusView, IncidentView,
    UpdateIncidentInput,
};
pub use lifecycle::{LifecycleEvent, Transition, VerifyChoice};
pub use notifier::{CompletionNotice, DeliveryReport, DeliveryStatus, Notifier, SmtpNotifier};
