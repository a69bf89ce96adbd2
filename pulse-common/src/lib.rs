//! # Pulse Common Library
//!
//! Shared code for the pulse services including:
//! - Canonical ECG event model and read-side projections
//! - Loosely-typed intermediate records used during ingestion
//! - Timestamp resolution with timezone overrides
//! - Bootstrap configuration loading

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
pub use events::{CanonicalEvent, LooseValue, Signal, Unit};
