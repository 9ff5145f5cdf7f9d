use thiserror::Error;

use crate::sheets::SheetsError;

/// Run-level failures: configuration problems at startup and store failures
/// mid-run. Adapter failures inside a row are handled where they happen and
/// end up as row outcomes, not as this type.
#[derive(Debug, Error)]
pub enum PeroError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Sheets error: {0}")]
    Sheets(#[from] SheetsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
