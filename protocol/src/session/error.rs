use thiserror::Error;

/// Errors raised by the session transport.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No node is registered under this name.
    #[error("no node named '{0}' is reachable")]
    UnknownParty(String),

    /// The counterparty went away (its half of the session was dropped, or
    /// the node stopped accepting sessions).
    #[error("session with '{counterparty}' closed")]
    Closed { counterparty: String },

    /// A message could not be encoded, or did not decode as the expected type.
    #[error("message codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
