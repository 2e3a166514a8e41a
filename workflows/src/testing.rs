//! In-process network for tests and demos.
//!
//! One network map, one session router and one in-memory commit service,
//! shared by every node created through it. Node keys are derived from the
//! node name, so runs are reproducible.

use std::sync::Arc;

use covenant_protocol::crypto::{blake3_hash, Keypair};

use crate::error::FlowError;
use crate::node::{NetworkServices, Node};
use crate::oracle::OracleService;

pub struct MockNetwork {
    services: NetworkServices,
    nodes: Vec<Arc<Node>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self {
            services: NetworkServices::new(Keypair::from_seed(&blake3_hash(b"covenant mock notary"))),
            nodes: Vec::new(),
        }
    }

    pub fn services(&self) -> &NetworkServices {
        &self.services
    }

    /// Start a node named `name`. Must be called inside a Tokio runtime.
    pub fn create_node(&mut self, name: &str) -> Result<Arc<Node>, FlowError> {
        self.start(name, None)
    }

    pub fn create_oracle(&mut self, name: &str, service: OracleService) -> Result<Arc<Node>, FlowError> {
        self.start(name, Some(service))
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    /// Transactions accepted by the commit service so far.
    pub fn committed_count(&self) -> usize {
        self.services.ledger.committed_count()
    }

    fn start(&mut self, name: &str, oracle: Option<OracleService>) -> Result<Arc<Node>, FlowError> {
        let legal = Keypair::from_seed(&blake3_hash(name.as_bytes()));
        let node = Node::start(name, legal, &self.services, oracle)?;
        self.nodes.push(Arc::clone(&node));
        Ok(node)
    }
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MockNetwork {
    fn drop(&mut self) {
        for node in &self.nodes {
            node.stop();
        }
    }
}
