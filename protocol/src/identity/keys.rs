//! Node-local key management.
//!
//! Holds the node's legal keypair plus every fresh key it has minted for
//! confidential transactions. Signing is always "sign this transaction id
//! with this public key"; callers never see a secret.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::crypto::hash::SecureHash;
use crate::crypto::keys::{Keypair, PublicKey};
use crate::crypto::signatures::TransactionSignature;
use crate::identity::service::IdentityError;

pub struct KeyManagementService {
    legal_key: PublicKey,
    keys: RwLock<HashMap<PublicKey, Keypair>>,
}

impl KeyManagementService {
    pub fn new(legal: Keypair) -> Self {
        let legal_key = legal.public_key();
        let mut keys = HashMap::new();
        keys.insert(legal_key, legal);
        Self {
            legal_key,
            keys: RwLock::new(keys),
        }
    }

    pub fn legal_key(&self) -> PublicKey {
        self.legal_key
    }

    /// Mint and store a single-use key.
    pub fn fresh_key(&self) -> PublicKey {
        let kp = Keypair::generate();
        let key = kp.public_key();
        self.keys.write().insert(key, kp);
        key
    }

    pub fn owns(&self, key: &PublicKey) -> bool {
        self.keys.read().contains_key(key)
    }

    /// The subset of `candidates` this node can sign for, in input order.
    pub fn filter_my_keys<'a, I>(&self, candidates: I) -> Vec<PublicKey>
    where
        I: IntoIterator<Item = &'a PublicKey>,
    {
        let keys = self.keys.read();
        candidates
            .into_iter()
            .filter(|k| keys.contains_key(k))
            .copied()
            .collect()
    }

    pub fn sign(&self, tx_id: &SecureHash, key: &PublicKey) -> Result<TransactionSignature, IdentityError> {
        let keys = self.keys.read();
        let kp = keys.get(key).ok_or(IdentityError::UnknownKey(*key))?;
        Ok(TransactionSignature::sign(kp, tx_id))
    }

    /// Sign raw bytes. Used for ownership proofs, never for transactions.
    pub fn sign_bytes(&self, message: &[u8], key: &PublicKey) -> Result<crate::crypto::Signature, IdentityError> {
        let keys = self.keys.read();
        let kp = keys.get(key).ok_or(IdentityError::UnknownKey(*key))?;
        Ok(kp.sign(message))
    }
}
