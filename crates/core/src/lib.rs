//! Core business logic for SafeTracker.

pub mod services;

pub use services::*;
