//! Error types for the Aviatrix controller client

use thiserror::Error;

/// Result type alias using the client Error
pub type Result<T> = std::result::Result<T, Error>;

/// Controller client error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rest API {action} POST failed: {reason}")]
    Api { action: String, reason: String },

    #[error("resource not found")]
    NotFound,

    #[error("rest API {action} returned an empty results payload")]
    MissingResults { action: String },

    #[error("not logged in to the controller")]
    NotLoggedIn,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// True for the not-found signal a read treats as "object is gone"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }

    /// True when the controller rejected the session id
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Error::Api { reason, .. } if reason.contains("CID is invalid or expired"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_expiry_detection() {
        let expired = Error::Api {
            action: "get_site2cloud_conn_detail".to_string(),
            reason: "CID is invalid or expired.".to_string(),
        };
        assert!(expired.is_session_expired());
        assert!(!expired.is_not_found());

        let other = Error::Api {
            action: "get_site2cloud_conn_detail".to_string(),
            reason: "Gateway tgw-1 is down".to_string(),
        };
        assert!(!other.is_session_expired());
        assert!(!Error::NotFound.is_session_expired());
    }
}
