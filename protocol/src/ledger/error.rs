use thiserror::Error;

use super::wire::ComponentGroup;
use crate::crypto::hash::SecureHash;
use crate::crypto::keys::PublicKey;
use crate::crypto::signatures::SignatureError;

/// Errors from building, checking or filtering transactions.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("canonical encoding failed: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("transaction has no commands")]
    NoCommands,

    #[error("transaction id mismatch: claimed {claimed}, recomputed {recomputed}")]
    IdMismatch {
        claimed: SecureHash,
        recomputed: SecureHash,
    },

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("missing signatures from {} required signer(s)", .0.len())]
    MissingSignatures(Vec<PublicKey>),

    #[error("signature by {0} is not from a required signer")]
    UnexpectedSigner(PublicKey),

    #[error("filtered transaction is malformed: {0}")]
    MalformedFilter(String),

    #[error("component {index} of group {group:?} does not match its leaf hash")]
    LeafMismatch { group: ComponentGroup, index: u32 },

    #[error("not every command requiring {0} is visible")]
    CommandNotVisible(PublicKey),
}
