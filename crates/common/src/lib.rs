//! Common utilities and shared types for SafeTracker.
//!
//! This crate provides foundational components used across all SafeTracker crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **Storage**: Upload storage backends and filename sanitizing
//!
//! # Example
//!
//! ```no_run
//! use safetracker_common::{Config, AppResult, sanitize_filename};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     println!("uploads go to {}", config.storage.upload_dir);
//!     assert_eq!(sanitize_filename("my photo.png"), "my_photo.png");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use storage::{LocalStorage, StorageBackend, StoredFile, sanitize_filename};
