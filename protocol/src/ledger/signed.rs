//! A wire transaction plus the signatures collected over its id.

use serde::{Deserialize, Serialize};

use super::error::LedgerError;
use super::state::{CommandData, ContractState};
use super::wire::WireTransaction;
use crate::crypto::hash::SecureHash;
use crate::crypto::keys::PublicKey;
use crate::crypto::signatures::{verify_all, TransactionSignature};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction<S, C> {
    pub tx: WireTransaction<S, C>,
    pub sigs: Vec<TransactionSignature>,
}

impl<S: ContractState, C: CommandData> SignedTransaction<S, C> {
    pub fn new(tx: WireTransaction<S, C>, sigs: Vec<TransactionSignature>) -> Self {
        Self { tx, sigs }
    }

    pub fn id(&self) -> SecureHash {
        self.tx.id()
    }

    /// Append a signature after checking it. A second signature by the same
    /// key replaces nothing and is dropped.
    pub fn with_signature(mut self, sig: TransactionSignature) -> Result<Self, LedgerError> {
        sig.verify(&self.id())?;
        if !self.sigs.iter().any(|s| s.by == sig.by) {
            self.sigs.push(sig);
        }
        Ok(self)
    }

    pub fn with_signatures(
        self,
        sigs: impl IntoIterator<Item = TransactionSignature>,
    ) -> Result<Self, LedgerError> {
        sigs.into_iter().try_fold(self, |stx, sig| stx.with_signature(sig))
    }

    pub fn signers(&self) -> Vec<PublicKey> {
        self.sigs.iter().map(|s| s.by).collect()
    }

    pub fn required_signers(&self) -> Vec<PublicKey> {
        self.tx.required_signers()
    }

    pub fn missing_signers(&self) -> Vec<PublicKey> {
        self.required_signers()
            .into_iter()
            .filter(|k| !self.sigs.iter().any(|s| s.by == *k))
            .collect()
    }

    /// Check the id and every attached signature, and require every
    /// command signer except those listed in `allowed_missing`.
    pub fn verify_signatures_except(&self, allowed_missing: &[PublicKey]) -> Result<(), LedgerError> {
        self.tx.check_id()?;
        verify_all(&self.id(), &self.sigs)?;
        let missing: Vec<PublicKey> = self
            .missing_signers()
            .into_iter()
            .filter(|k| !allowed_missing.contains(k))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::MissingSignatures(missing))
        }
    }

    /// Fully signed by every command signer.
    pub fn verify_required_signatures(&self) -> Result<(), LedgerError> {
        self.verify_signatures_except(&[])
    }
}
