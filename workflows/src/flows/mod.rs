//! Obligation flows.
//!
//! Each flow has an initiator (a struct with `run`) and a responder
//! (`respond`, started by the node's dispatcher). Every initiator walks
//! INITIALISING → BUILDING → SIGNING → COLLECTING → FINALISING and ends in
//! COMMITTED or ABORTED; novation adds HANDLING after INITIALISING.

pub mod cancel;
mod common;
pub mod create;
pub mod novate;
pub mod update;

pub use cancel::CancelObligation;
pub use create::{CreateObligation, Role};
pub use novate::NovateObligation;
pub use update::{AddPayment, UpdatePaymentStatus, UpdateSettlementMethod};
