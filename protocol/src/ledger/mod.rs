//! # Ledger Module
//!
//! Transactions and where they end up.
//!
//! ## Lifecycle
//!
//! ```text
//!   TransactionBuilder ──build──▶ WireTransaction (id = Merkle root)
//!          │
//!          ▼
//!   SignedTransaction  ◀── signatures over the id
//!          │                  ▲
//!          │                  └── FilteredTransaction (partial view, same id)
//!          ▼
//!   CommitService ──▶ every participant's Vault
//! ```

pub mod builder;
pub mod commit;
pub mod error;
pub mod filtered;
pub mod signed;
pub mod state;
pub mod vault;
pub mod wire;

pub use builder::TransactionBuilder;
pub use commit::{CommitError, CommitService, CommittedTransaction, InMemoryLedger};
pub use error::LedgerError;
pub use filtered::{FilteredGroup, FilteredTransaction, RevealedComponent, TxComponent};
pub use signed::SignedTransaction;
pub use state::{Command, CommandData, ContractState, LinearState, StateAndRef, StateRef, TimeWindow};
pub use vault::{StateStatus, Vault};
pub use wire::{ComponentGroup, WireTransaction};
