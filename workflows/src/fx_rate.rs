//! Rate oracle client.
//!
//! One request, one answer. No retries and no timeout here: the caller
//! decides how long to wait.

use covenant_contracts::{FxRate, FxRateRequest};
use covenant_protocol::config::PROTOCOL_FX_RATE;
use covenant_protocol::identity::Party;
use tracing::debug;

use crate::error::FlowError;
use crate::node::Node;
use crate::oracle::OracleReply;

/// Ask `oracle` for the rate that answers `request`.
///
/// The answer must be for exactly the requested pair and time; anything
/// else is [`FlowError::RateMismatch`].
pub async fn get_fx_rate(node: &Node, request: &FxRateRequest, oracle: &Party) -> Result<FxRate, FlowError> {
    let mut session = node.initiate(oracle, PROTOCOL_FX_RATE)?;
    let reply: OracleReply<FxRate> = session.send_and_receive(request).await?;

    let rate = match reply {
        OracleReply::Ok(rate) => rate,
        OracleReply::Refused(reason) => {
            return Err(FlowError::OracleRefused {
                oracle: oracle.name.clone(),
                reason,
            })
        }
    };
    if !request.is_answered_by(&rate) {
        return Err(FlowError::RateMismatch);
    }

    debug!(
        oracle = %oracle.name,
        base = %rate.base_currency,
        counter = %rate.counter_currency,
        rate = %rate.rate,
        "fx rate received"
    );
    Ok(rate)
}
