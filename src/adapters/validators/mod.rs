//! Validator adapters.

pub mod consistency;

pub use consistency::ConsistencyValidator;
