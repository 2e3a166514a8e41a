//! Point-to-point sessions between named parties.

pub mod error;
pub mod router;

pub use error::SessionError;
pub use router::{FlowSession, InboundSession, MessageRouter};
