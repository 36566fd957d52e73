use std::sync::PoisonError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Duplicate text in vocabulary '{vocabulary}': {text}")]
    DuplicateText { vocabulary: String, text: String },
    #[error("Blank text is not a valid value in vocabulary '{vocabulary}'")]
    BlankText { vocabulary: String },
    #[error("Invalid name: '{0}'")]
    InvalidName(String),
    #[error("Missing value for '{attribute}' on {host}")]
    Missing { host: String, attribute: String },
    #[error("Unknown lookup attribute '{attribute}' on {host}")]
    UnknownAttribute { host: String, attribute: String },
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, LookupError>;

// Helper conversions
impl From<rusqlite::Error> for LookupError {
    fn from(e: rusqlite::Error) -> Self { Self::StoreUnavailable(e.to_string()) }
}
impl From<config::ConfigError> for LookupError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
impl<T> From<PoisonError<T>> for LookupError {
    fn from(e: PoisonError<T>) -> Self { Self::Lock(e.to_string()) }
}

/// Names end up as SQL table and column identifiers, so they are kept to
/// `[A-Za-z_][A-Za-z0-9_]*`.
pub(crate) fn check_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid { Ok(()) } else { Err(LookupError::InvalidName(name.to_string())) }
}
