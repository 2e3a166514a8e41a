//! In-process session transport.
//!
//! Every node registers with the [`MessageRouter`] and gets an inbox of
//! [`InboundSession`]s. An initiator opens a session to a named party under
//! a protocol name; the responder's dispatcher reads the protocol name off
//! the inbound session and starts the matching responder.
//!
//! A session is a pair of ordered unbounded channels. Messages are JSON on
//! the wire so that both halves agree on field names and nothing else.

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::trace;
use uuid::Uuid;

use super::error::SessionError;
use crate::identity::party::Party;

/// A freshly opened session waiting to be handled by a responder.
#[derive(Debug)]
pub struct InboundSession {
    pub protocol: String,
    pub session: FlowSession,
}

/// One side of a point-to-point conversation.
#[derive(Debug)]
pub struct FlowSession {
    id: Uuid,
    counterparty: Party,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl FlowSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn counterparty(&self) -> &Party {
        &self.counterparty
    }

    pub fn send<T: Serialize>(&self, message: &T) -> Result<(), SessionError> {
        let bytes = serde_json::to_vec(message)?;
        trace!(session = %self.id, to = %self.counterparty.name, len = bytes.len(), "send");
        self.outbound.send(bytes).map_err(|_| self.closed())
    }

    /// Wait for the next message. Blocks until one arrives or the
    /// counterparty drops its half.
    pub async fn receive<T: DeserializeOwned>(&mut self) -> Result<T, SessionError> {
        let bytes = self.inbound.recv().await.ok_or_else(|| self.closed())?;
        trace!(session = %self.id, from = %self.counterparty.name, len = bytes.len(), "receive");
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn send_and_receive<Req, Resp>(&mut self, message: &Req) -> Result<Resp, SessionError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        self.send(message)?;
        self.receive().await
    }

    fn closed(&self) -> SessionError {
        SessionError::Closed {
            counterparty: self.counterparty.name.clone(),
        }
    }
}

/// Directory of node inboxes.
#[derive(Default)]
pub struct MessageRouter {
    inboxes: DashMap<String, mpsc::UnboundedSender<InboundSession>>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `party` and return its inbox. Registering again replaces the
    /// previous inbox.
    pub fn register(&self, party: &Party) -> mpsc::UnboundedReceiver<InboundSession> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inboxes.insert(party.name.clone(), tx);
        rx
    }

    /// Take `party` off the network. Sessions already open stay open.
    pub fn unregister(&self, party: &Party) {
        self.inboxes.remove(&party.name);
    }

    /// Open a session from `from` to `to` under `protocol`.
    pub fn initiate(&self, from: &Party, to: &Party, protocol: &str) -> Result<FlowSession, SessionError> {
        let inbox = self
            .inboxes
            .get(&to.name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SessionError::UnknownParty(to.name.clone()))?;

        let id = Uuid::new_v4();
        let (to_responder, responder_inbound) = mpsc::unbounded_channel();
        let (to_initiator, initiator_inbound) = mpsc::unbounded_channel();

        let responder = FlowSession {
            id,
            counterparty: from.clone(),
            outbound: to_initiator,
            inbound: responder_inbound,
        };
        inbox
            .send(InboundSession {
                protocol: protocol.to_string(),
                session: responder,
            })
            .map_err(|_| SessionError::Closed {
                counterparty: to.name.clone(),
            })?;

        trace!(session = %id, from = %from.name, to = %to.name, protocol, "session opened");
        Ok(FlowSession {
            id,
            counterparty: to.clone(),
            outbound: to_responder,
            inbound: initiator_inbound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::Keypair;
    use serde::Deserialize;

    fn party(name: &str) -> Party {
        Party::new(name, Keypair::generate().public_key())
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Ping(u32);

    #[tokio::test]
    async fn messages_flow_both_ways_in_order() {
        let router = MessageRouter::new();
        let (alice, bob) = (party("Alice"), party("Bob"));
        let _alice_inbox = router.register(&alice);
        let mut bob_inbox = router.register(&bob);

        let mut session = router.initiate(&alice, &bob, "ping/1").unwrap();
        session.send(&Ping(1)).unwrap();
        session.send(&Ping(2)).unwrap();

        let mut inbound = bob_inbox.recv().await.unwrap();
        assert_eq!(inbound.protocol, "ping/1");
        assert_eq!(inbound.session.counterparty(), &alice);
        assert_eq!(inbound.session.id(), session.id());
        assert_eq!(inbound.session.receive::<Ping>().await.unwrap(), Ping(1));
        assert_eq!(inbound.session.receive::<Ping>().await.unwrap(), Ping(2));

        inbound.session.send(&Ping(3)).unwrap();
        assert_eq!(session.receive::<Ping>().await.unwrap(), Ping(3));
    }

    #[tokio::test]
    async fn dropped_peer_surfaces_closed() {
        let router = MessageRouter::new();
        let (alice, bob) = (party("Alice"), party("Bob"));
        let mut bob_inbox = router.register(&bob);

        let mut session = router.initiate(&alice, &bob, "ping/1").unwrap();
        drop(bob_inbox.recv().await.unwrap());

        let err = session.send_and_receive::<_, Ping>(&Ping(1)).await.unwrap_err();
        assert!(matches!(err, SessionError::Closed { counterparty } if counterparty == "Bob"));
    }

    #[test]
    fn unknown_party_cannot_be_reached() {
        let router = MessageRouter::new();
        let (alice, bob) = (party("Alice"), party("Bob"));
        let err = router.initiate(&alice, &bob, "ping/1").unwrap_err();
        assert!(matches!(err, SessionError::UnknownParty(name) if name == "Bob"));
    }

    #[tokio::test]
    async fn wrong_message_type_is_a_codec_error() {
        let router = MessageRouter::new();
        let (alice, bob) = (party("Alice"), party("Bob"));
        let mut bob_inbox = router.register(&bob);

        let session = router.initiate(&alice, &bob, "ping/1").unwrap();
        session.send(&"not a ping").unwrap();
        let mut inbound = bob_inbox.recv().await.unwrap();
        assert!(matches!(
            inbound.session.receive::<Ping>().await,
            Err(SessionError::Codec(_))
        ));
    }
}
