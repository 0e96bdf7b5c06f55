//! Error taxonomy for the KDS sync core.
//!
//! Every failure is recovered at the boundary where it occurs (repository,
//! mutation controller, live channel) and converted into one of these
//! variants for the UI layer. Nothing here crashes the event loop, and no
//! variant is retried automatically by the core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A required identifier (store id, auth token) is missing. The caller
    /// should redirect to re-authentication instead of retrying.
    #[error("not configured: missing {field}")]
    Config { field: &'static str },

    /// Non-2xx response or malformed body from the owner/manager API.
    /// `status` is `None` when the failure happened before a response
    /// arrived (connect error, timeout, bad URL).
    #[error("{message}")]
    Fetch {
        status: Option<u16>,
        message: String,
    },

    /// A write-through call failed. The optimistic local change has already
    /// been rolled back by the time this surfaces.
    #[error("{entity} update failed: {message}")]
    Mutation {
        entity: &'static str,
        message: String,
    },

    /// Live-channel failure (connect, reconnect, subscribe). The in-memory
    /// collections keep their last known-good state.
    #[error("live channel error: {message}")]
    Transport { message: String },
}

impl Error {
    pub fn fetch(status: Option<u16>, message: impl Into<String>) -> Self {
        Error::Fetch {
            status,
            message: message.into(),
        }
    }

    pub fn mutation(entity: &'static str, message: impl Into<String>) -> Self {
        Error::Mutation {
            entity,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Error::Transport {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_the_missing_field() {
        let err = Error::Config {
            field: "selectedStoreId",
        };
        assert_eq!(err.to_string(), "not configured: missing selectedStoreId");
    }

    #[test]
    fn mutation_error_carries_entity_and_detail() {
        let err = Error::mutation("station", "HTTP 500");
        assert_eq!(err.to_string(), "station update failed: HTTP 500");
    }
}
