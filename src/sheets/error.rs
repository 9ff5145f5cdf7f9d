use thiserror::Error;

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("Sheets API returned status {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("worksheet {tab} is missing required columns: {columns}")]
    MissingColumns { tab: String, columns: String },

    #[error("column {0} is not present in the worksheet header")]
    UnknownColumn(String),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}
