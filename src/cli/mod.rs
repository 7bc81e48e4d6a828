//! Command-line interface.

pub mod commands;
pub mod output;
mod types;

pub use types::{Cli, Commands};

use crate::domain::errors::SessionError;

/// Print `err` and exit with a non-zero status.
///
/// Session failures keep their machine-readable code in JSON mode.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    let code = err.downcast_ref::<SessionError>().map_or("ERROR", SessionError::code);

    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
            "code": code,
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
