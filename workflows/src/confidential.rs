//! # Confidential Identity Exchange
//!
//! Both sides mint a single-use key, prove they own it, and register both
//! keys against their well-known identities. Afterwards each can resolve
//! either pseudonym; nobody else can.
//!
//! ## Wire Format
//!
//! ```text
//! Requester → Responder: KeyRequest { challenge }
//! Responder → Requester: KeyResponse { claim, challenge }
//! Requester → Responder: OwnershipClaim
//! ```
//!
//! A claim is the fresh key, its claimed owner and the fresh key's
//! signature over `challenge || owner key || fresh key`. The challenge comes
//! from the side that will verify the claim, so a claim cannot be replayed
//! into another exchange.

use covenant_protocol::crypto::{PublicKey, Signature};
use covenant_protocol::identity::{AnonymousParty, IdentityService, Party};
use covenant_protocol::session::FlowSession;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::FlowError;
use crate::node::Node;

#[derive(Debug, Serialize, Deserialize)]
struct KeyRequest {
    challenge: [u8; 32],
}

#[derive(Debug, Serialize, Deserialize)]
struct KeyResponse {
    claim: OwnershipClaim,
    challenge: [u8; 32],
}

/// Signed statement that `key` belongs to `owner`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OwnershipClaim {
    pub key: PublicKey,
    pub owner: Party,
    pub signature: Signature,
}

impl OwnershipClaim {
    fn message(challenge: &[u8; 32], owner: &Party, key: &PublicKey) -> Vec<u8> {
        let mut msg = Vec::with_capacity(96);
        msg.extend_from_slice(challenge);
        msg.extend_from_slice(owner.owning_key.as_bytes());
        msg.extend_from_slice(key.as_bytes());
        msg
    }

    fn create(node: &Node, challenge: &[u8; 32]) -> Result<Self, FlowError> {
        let key = node.keys().fresh_key();
        let owner = node.party().clone();
        node.identity().register_key(key, owner.clone())?;
        let signature = node
            .keys()
            .sign_bytes(&Self::message(challenge, &owner, &key), &key)?;
        Ok(Self { key, owner, signature })
    }

    /// Check the claim against the challenge we issued and the party we are
    /// talking to.
    fn verify(&self, challenge: &[u8; 32], expected_owner: &Party) -> Result<(), FlowError> {
        if &self.owner != expected_owner {
            return Err(FlowError::protocol(format!(
                "key claimed for {}, session is with {}",
                self.owner.name, expected_owner.name
            )));
        }
        if !self
            .key
            .verify(&Self::message(challenge, &self.owner, &self.key), &self.signature)
        {
            return Err(FlowError::protocol("ownership claim signature is invalid"));
        }
        Ok(())
    }
}

/// The two pseudonyms produced by one exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfidentialIdentities {
    pub ours: AnonymousParty,
    pub theirs: AnonymousParty,
}

/// Requester half. Returns once both bindings are registered locally and
/// the counterparty has been given ours.
pub async fn request_confidential_identities(
    node: &Node,
    session: &mut FlowSession,
) -> Result<ConfidentialIdentities, FlowError> {
    let challenge: [u8; 32] = rand::random();
    let response: KeyResponse = session.send_and_receive(&KeyRequest { challenge }).await?;

    let counterparty = session.counterparty().clone();
    if let Err(e) = response.claim.verify(&challenge, &counterparty) {
        warn!(party = %node.party().name, counterparty = %counterparty.name, error = %e, "rejected ownership claim");
        return Err(e);
    }
    node.identity()
        .register_key(response.claim.key, counterparty.clone())?;

    let ours = OwnershipClaim::create(node, &response.challenge)?;
    session.send(&ours)?;

    debug!(party = %node.party().name, counterparty = %counterparty.name, "confidential identities exchanged");
    Ok(ConfidentialIdentities {
        ours: AnonymousParty::new(ours.key),
        theirs: AnonymousParty::new(response.claim.key),
    })
}

/// Responder half.
pub async fn respond_confidential_identities(
    node: &Node,
    session: &mut FlowSession,
) -> Result<ConfidentialIdentities, FlowError> {
    let request: KeyRequest = session.receive().await?;
    let ours = OwnershipClaim::create(node, &request.challenge)?;
    let challenge: [u8; 32] = rand::random();

    let theirs: OwnershipClaim = session
        .send_and_receive(&KeyResponse {
            claim: ours.clone(),
            challenge,
        })
        .await?;

    let counterparty = session.counterparty().clone();
    theirs.verify(&challenge, &counterparty)?;
    node.identity().register_key(theirs.key, counterparty.clone())?;

    debug!(party = %node.party().name, counterparty = %counterparty.name, "confidential identities exchanged");
    Ok(ConfidentialIdentities {
        ours: AnonymousParty::new(ours.key),
        theirs: AnonymousParty::new(theirs.key),
    })
}
