//! # Protocol Constants
//!
//! Every constant the ledger core and the flows agree on lives here. Two
//! nodes that disagree on any of these cannot interoperate: a different
//! domain-separation context produces a different transaction id for the
//! same transaction, and a different session protocol name means the
//! responder never gets dispatched.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

pub const PROTOCOL_VERSION_MAJOR: u16 = 0;
pub const PROTOCOL_VERSION_MINOR: u16 = 1;
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Merkle Commitments
// ---------------------------------------------------------------------------

/// BLAKE3 `derive_key` context for per-component nonces. The nonce is
/// derived from the transaction's privacy salt, the group and the index, so
/// a hidden component cannot be brute-forced from its leaf hash.
pub const COMPONENT_NONCE_CONTEXT: &str = "covenant 2026 component nonce v1";

/// Context for component leaf hashes (nonce || canonical bytes).
pub const COMPONENT_LEAF_CONTEXT: &str = "covenant 2026 component leaf v1";

/// Length of a transaction's random privacy salt.
pub const PRIVACY_SALT_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Length of the validity window attached to a freshly created obligation.
/// The commit service rejects the transaction outside of it.
pub const CREATE_TIME_WINDOW: Duration = Duration::from_secs(30);

/// Default per-flow timeout applied by the node (never by the core).
pub const DEFAULT_FLOW_TIMEOUT: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Session Protocols
// ---------------------------------------------------------------------------
//
// The initiator opens a session naming one of these; the counterparty's
// dispatcher picks the matching responder.

pub const PROTOCOL_CREATE_OBLIGATION: &str = "obligation/create/1";
pub const PROTOCOL_NOVATE_OBLIGATION: &str = "obligation/novate/1";
pub const PROTOCOL_CANCEL_OBLIGATION: &str = "obligation/cancel/1";
pub const PROTOCOL_UPDATE_OBLIGATION: &str = "obligation/update/1";
pub const PROTOCOL_FX_RATE: &str = "oracle/fx-rate/1";
pub const PROTOCOL_FX_ORACLE_SIGNATURE: &str = "oracle/fx-signature/1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_matches_components() {
        assert_eq!(
            PROTOCOL_VERSION,
            format!("{}.{}.0", PROTOCOL_VERSION_MAJOR, PROTOCOL_VERSION_MINOR)
        );
    }

    #[test]
    fn merkle_contexts_are_distinct() {
        assert_ne!(COMPONENT_NONCE_CONTEXT, COMPONENT_LEAF_CONTEXT);
    }

    #[test]
    fn session_protocol_names_are_unique() {
        let names = [
            PROTOCOL_CREATE_OBLIGATION,
            PROTOCOL_NOVATE_OBLIGATION,
            PROTOCOL_CANCEL_OBLIGATION,
            PROTOCOL_UPDATE_OBLIGATION,
            PROTOCOL_FX_RATE,
            PROTOCOL_FX_ORACLE_SIGNATURE,
        ];
        let mut sorted = names.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), names.len());
    }

    #[test]
    fn flow_timeout_exceeds_create_window() {
        assert!(CREATE_TIME_WINDOW < DEFAULT_FLOW_TIMEOUT);
    }
}
