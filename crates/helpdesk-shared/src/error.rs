use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterParseError {
    #[error("Unknown category filter: {0:?} (expected all, urgent or system)")]
    Category(String),

    #[error("Unknown role filter: {0:?} (expected ALL, TECHNICIAN, MANAGER, ADMIN or CUSTOMER)")]
    Role(String),

    #[error("Unknown sort order: {0:?} (expected newest or oldest)")]
    Sort(String),
}

/// Failure of a best-effort alert surface. Never propagated past the
/// alert dispatcher.
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Alert surface unsupported: {0}")]
    Unsupported(&'static str),
}
