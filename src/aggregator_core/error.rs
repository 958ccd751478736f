//! Error taxonomy for windowed aggregation
//!
//! `InvalidRequest` is raised before any store access. `StoreUnavailable`
//! wraps whatever the store read returned and fails the whole call; no
//! partial window set is ever handed back.

use super::store::StoreError;

#[derive(Debug)]
pub enum AggregateError {
    /// Malformed request: unknown window name, empty sentiment filter, bad catalog
    InvalidRequest(String),
    /// Store read failed, timed out, or produced malformed records
    StoreUnavailable(StoreError),
}

impl From<StoreError> for AggregateError {
    fn from(err: StoreError) -> Self {
        AggregateError::StoreUnavailable(err)
    }
}

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            AggregateError::StoreUnavailable(e) => write!(f, "Store unavailable: {}", e),
        }
    }
}

impl std::error::Error for AggregateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AggregateError::InvalidRequest(_) => None,
            AggregateError::StoreUnavailable(e) => Some(e),
        }
    }
}

impl AggregateError {
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, AggregateError::InvalidRequest(_))
    }

    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, AggregateError::StoreUnavailable(_))
    }
}
