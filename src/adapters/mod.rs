//! Infrastructure adapters for storage, collaborators and transport.

pub mod http;
pub mod memory;
pub mod sqlite;
pub mod translators;
pub mod validators;
