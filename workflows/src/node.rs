//! The per-party service hub.
//!
//! A [`Node`] bundles everything one party needs to run flows: its legal
//! identity, key store, identity resolver, vault, a handle on the session
//! router and the commit service. It also runs the dispatcher that turns
//! inbound sessions into responder tasks.
//!
//! Flows never keep per-instance data on the node. Everything a flow
//! instance needs travels through its own stack; the node only offers
//! shared services and the per-obligation locks.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use covenant_contracts::{Obligation, ObligationCommand};
use covenant_protocol::config;
use covenant_protocol::crypto::{Keypair, TransactionSignature};
use covenant_protocol::identity::{
    AbstractParty, IdentityService, InMemoryIdentityService, KeyManagementService, NetworkMap, Party,
};
use covenant_protocol::ledger::{CommitService, InMemoryLedger, StateAndRef, Vault};
use covenant_protocol::session::{FlowSession, InboundSession, MessageRouter, SessionError};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::collect::{AcceptAll, TransactionInspector};
use crate::error::FlowError;
use crate::flows::{cancel, create, novate, update};
use crate::oracle::{self, OracleService};
use crate::ObligationTransaction;

/// Services shared by every node of one network.
#[derive(Clone)]
pub struct NetworkServices {
    pub network_map: Arc<NetworkMap>,
    pub router: Arc<MessageRouter>,
    pub ledger: Arc<InMemoryLedger<Obligation>>,
}

impl NetworkServices {
    /// A fresh network whose commit service signs with `notary`.
    pub fn new(notary: Keypair) -> Self {
        Self {
            network_map: Arc::new(NetworkMap::new()),
            router: Arc::new(MessageRouter::new()),
            ledger: Arc::new(InMemoryLedger::new(notary)),
        }
    }
}

pub struct Node {
    party: Party,
    keys: Arc<KeyManagementService>,
    identity: InMemoryIdentityService,
    vault: Arc<Vault<Obligation>>,
    router: Arc<MessageRouter>,
    commit: Arc<dyn CommitService<Obligation, ObligationCommand>>,
    inspector: RwLock<Arc<dyn TransactionInspector>>,
    oracle: Option<OracleService>,
    locks: DashMap<Uuid, Arc<AsyncMutex<()>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Node {
    /// Join the network as `name` and start answering sessions.
    ///
    /// Publishes the party on the network map, registers its vault with the
    /// commit service and spawns the dispatcher, so this must be called from
    /// inside a Tokio runtime.
    pub fn start(
        name: &str,
        legal: Keypair,
        services: &NetworkServices,
        oracle: Option<OracleService>,
    ) -> Result<Arc<Self>, FlowError> {
        let party = Party::new(name, legal.public_key());
        services.network_map.publish(party.clone())?;

        let keys = Arc::new(KeyManagementService::new(legal));
        let vault = Arc::new(Vault::for_keys(name, Arc::clone(&keys)));
        services.ledger.register_vault(&party, Arc::clone(&vault));
        let commit: Arc<dyn CommitService<Obligation, ObligationCommand>> = services.ledger.clone();

        let inbox = services.router.register(&party);
        let node = Arc::new(Self {
            party,
            keys,
            identity: InMemoryIdentityService::new(Arc::clone(&services.network_map)),
            vault,
            router: Arc::clone(&services.router),
            commit,
            inspector: RwLock::new(Arc::new(AcceptAll)),
            oracle,
            locks: DashMap::new(),
            dispatcher: Mutex::new(None),
        });

        let handle = tokio::spawn(dispatch_loop(Arc::downgrade(&node), inbox));
        *node.dispatcher.lock() = Some(handle);
        info!(party = %node.party.name, oracle = node.oracle.is_some(), "node started");
        Ok(node)
    }

    /// Leave the network. Sessions already open keep running; new ones to
    /// this party fail with [`SessionError::UnknownParty`].
    pub fn stop(&self) {
        self.router.unregister(&self.party);
        if let Some(handle) = self.dispatcher.lock().take() {
            handle.abort();
        }
        info!(party = %self.party.name, "node stopped");
    }

    // -----------------------------------------------------------------------
    // Services
    // -----------------------------------------------------------------------

    pub fn party(&self) -> &Party {
        &self.party
    }

    pub fn keys(&self) -> &KeyManagementService {
        &self.keys
    }

    pub fn identity(&self) -> &InMemoryIdentityService {
        &self.identity
    }

    pub fn vault(&self) -> &Vault<Obligation> {
        &self.vault
    }

    pub fn commit_service(&self) -> &dyn CommitService<Obligation, ObligationCommand> {
        self.commit.as_ref()
    }

    pub fn oracle(&self) -> Option<&OracleService> {
        self.oracle.as_ref()
    }

    pub fn inspector(&self) -> Arc<dyn TransactionInspector> {
        self.inspector.read().clone()
    }

    /// Replace the policy consulted before this node counter-signs.
    pub fn set_inspector(&self, inspector: Arc<dyn TransactionInspector>) {
        *self.inspector.write() = inspector;
    }

    /// Look up a well-known party by name on the network map.
    pub fn party_named(&self, name: &str) -> Option<Party> {
        self.identity.network_map().party_from_name(name)
    }

    pub fn initiate(&self, to: &Party, protocol: &str) -> Result<FlowSession, SessionError> {
        self.router.initiate(&self.party, to, protocol)
    }

    // -----------------------------------------------------------------------
    // Helpers shared by flows
    // -----------------------------------------------------------------------

    /// Whether `party` is this node, under its legal key or a pseudonym.
    pub fn is_me(&self, party: &AbstractParty) -> bool {
        self.keys.owns(&party.owning_key())
    }

    /// The live obligation with `id`, or [`FlowError::NotFound`].
    pub fn live_obligation(&self, id: Uuid) -> Result<StateAndRef<Obligation>, FlowError> {
        self.vault.get_linear_by_id(id).ok_or(FlowError::NotFound(id))
    }

    /// Well-known counterparts of `parties`, excluding this node, without
    /// duplicates, in first-seen order.
    pub fn counterparties<'a, I>(&self, parties: I) -> Result<Vec<Party>, FlowError>
    where
        I: IntoIterator<Item = &'a AbstractParty>,
    {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for party in parties {
            if self.is_me(party) {
                continue;
            }
            let resolved = self.identity.require_well_known_party(party)?;
            if resolved.name == self.party.name {
                continue;
            }
            if seen.insert(resolved.name.clone()) {
                out.push(resolved);
            }
        }
        Ok(out)
    }

    /// A signature for every required signer of `stx` this node holds a
    /// key for. Fails if there is none.
    pub fn my_signatures(&self, stx: &ObligationTransaction) -> Result<Vec<TransactionSignature>, FlowError> {
        let id = stx.id();
        let mine = self.keys.filter_my_keys(&stx.required_signers());
        if mine.is_empty() {
            return Err(FlowError::NotParticipant(self.party.name.clone()));
        }
        Ok(mine
            .iter()
            .map(|key| self.keys.sign(&id, key))
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// `stx` with this node's signatures attached.
    pub fn sign_as_participant(&self, stx: ObligationTransaction) -> Result<ObligationTransaction, FlowError> {
        let sigs = self.my_signatures(&stx)?;
        Ok(stx.with_signatures(sigs)?)
    }

    /// Serialize flows that touch obligation `id` on this node. The guard
    /// is held until the flow finishes.
    pub async fn lock_obligation(&self, id: Uuid) -> ObligationGuard<'_> {
        let lock = self
            .locks
            .entry(id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        ObligationGuard {
            locks: &self.locks,
            id,
            _held: lock.lock_owned().await,
        }
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    async fn dispatch(self: Arc<Self>, inbound: InboundSession) {
        let InboundSession { protocol, session } = inbound;
        let from = session.counterparty().name.clone();
        debug!(party = %self.party.name, %protocol, %from, "dispatching responder");

        let result = match protocol.as_str() {
            config::PROTOCOL_CREATE_OBLIGATION => create::respond(&self, session).await,
            config::PROTOCOL_NOVATE_OBLIGATION => novate::respond(&self, session).await,
            config::PROTOCOL_CANCEL_OBLIGATION => cancel::respond(&self, session).await,
            config::PROTOCOL_UPDATE_OBLIGATION => update::respond(&self, session).await,
            config::PROTOCOL_FX_RATE => oracle::respond_fx_rate(&self, session).await,
            config::PROTOCOL_FX_ORACLE_SIGNATURE => oracle::respond_signature(&self, session).await,
            other => {
                warn!(party = %self.party.name, protocol = other, %from, "no responder for protocol");
                return;
            }
        };

        match result {
            Ok(()) => debug!(party = %self.party.name, %protocol, %from, "responder finished"),
            Err(e) => warn!(party = %self.party.name, %protocol, %from, error = %e, "responder failed"),
        }
    }
}

/// Exclusive hold on one obligation. Dropping the last hold removes the
/// obligation's lock from the node.
pub struct ObligationGuard<'a> {
    locks: &'a DashMap<Uuid, Arc<AsyncMutex<()>>>,
    id: Uuid,
    _held: OwnedMutexGuard<()>,
}

impl Drop for ObligationGuard<'_> {
    fn drop(&mut self) {
        // One reference in the map, one in `_held`: nobody else is waiting.
        self.locks.remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 2);
    }
}

async fn dispatch_loop(node: Weak<Node>, mut inbox: mpsc::UnboundedReceiver<InboundSession>) {
    while let Some(inbound) = inbox.recv().await {
        let Some(node) = node.upgrade() else {
            break;
        };
        tokio::spawn(node.dispatch(inbound));
    }
}
