use thiserror::Error;

use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "xlsx")]
    #[error("XLSX error: {0}")]
    Xlsx(#[from] calamine::Error),

    #[error("Missing column `{column}` in {context}")]
    MissingColumn { column: String, context: String },

    #[error("Invalid number in column `{column}` row {row}: {value:?}")]
    InvalidNumber {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Invalid timestamp in column `{column}` row {row}: {value:?}")]
    InvalidTimestamp {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Row has {found} cells, table has {expected} columns")]
    RowWidth { expected: usize, found: usize },

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Unknown store: {0}")]
    UnknownStore(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Other(String),
}

impl TallyError {
    pub fn missing_column(column: &str, context: &str) -> Self {
        Self::MissingColumn {
            column: column.to_string(),
            context: context.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TallyError>;
