//! Translator adapters.

pub mod heuristic;
pub mod http;

pub use heuristic::HeuristicTranslator;
pub use http::HttpTranslator;
