//! Domain layer for the Specforge session engine
//!
//! This module contains the IR model, session lifecycle types, and the ports
//! collaborators and storage adapters implement.

pub mod errors;
pub mod models;
pub mod ports;
pub mod text;

pub use errors::{DomainError, DomainResult, SessionError, SessionResult, TranslationError};
