//! # Transaction Signatures
//!
//! Every endorsement in Covenant is a signature over a transaction id, the
//! Merkle root of the transaction's components. Because the id commits to
//! everything, a signature over it endorses everything, and a filtered view
//! that reproduces the same id can be signed by a party who only saw part
//! of the transaction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::hash::SecureHash;
use super::keys::{Keypair, PublicKey, Signature};

/// Errors raised when checking signatures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature by {0} does not verify against the transaction id")]
    VerificationFailed(PublicKey),
}

/// A signature over a transaction id, tagged with the key that made it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub by: PublicKey,
    pub signature: Signature,
}

impl TransactionSignature {
    /// Sign `tx_id` with `keypair`.
    pub fn sign(keypair: &Keypair, tx_id: &SecureHash) -> Self {
        Self {
            by: keypair.public_key(),
            signature: keypair.sign(tx_id.as_bytes()),
        }
    }

    /// Check this signature against `tx_id`.
    pub fn verify(&self, tx_id: &SecureHash) -> Result<(), SignatureError> {
        if self.by.verify(tx_id.as_bytes(), &self.signature) {
            Ok(())
        } else {
            Err(SignatureError::VerificationFailed(self.by))
        }
    }
}

/// Verify every signature in `sigs` against `tx_id`. Fails on the first bad
/// one and names its key.
pub fn verify_all(tx_id: &SecureHash, sigs: &[TransactionSignature]) -> Result<(), SignatureError> {
    sigs.iter().try_for_each(|sig| sig.verify(tx_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_verifies_against_signed_id() {
        let kp = Keypair::generate();
        let id = SecureHash::of(b"tx");
        let sig = TransactionSignature::sign(&kp, &id);
        assert_eq!(sig.by, kp.public_key());
        assert!(sig.verify(&id).is_ok());
    }

    #[test]
    fn signature_fails_against_other_id() {
        let kp = Keypair::generate();
        let sig = TransactionSignature::sign(&kp, &SecureHash::of(b"tx-1"));
        assert_eq!(
            sig.verify(&SecureHash::of(b"tx-2")),
            Err(SignatureError::VerificationFailed(kp.public_key()))
        );
    }

    #[test]
    fn verify_all_reports_the_bad_signer() {
        let good = Keypair::generate();
        let bad = Keypair::generate();
        let id = SecureHash::of(b"tx");
        let sigs = vec![
            TransactionSignature::sign(&good, &id),
            TransactionSignature::sign(&bad, &SecureHash::of(b"other")),
        ];
        assert_eq!(
            verify_all(&id, &sigs),
            Err(SignatureError::VerificationFailed(bad.public_key()))
        );
    }

    #[test]
    fn verify_all_on_empty_is_ok() {
        assert!(verify_all(&SecureHash::of(b"tx"), &[]).is_ok());
    }
}
