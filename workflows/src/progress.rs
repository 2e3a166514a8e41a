//! Step reporting for flows.
//!
//! Each flow walks a linear sequence of steps and finishes in exactly one
//! of [`FlowStep::Committed`] or [`FlowStep::Aborted`]. The tracker records
//! the path taken and logs every transition.

use std::fmt;

use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowStep {
    Initialising,
    /// Novation only: applying the novation command to the current state.
    Handling,
    Building,
    Signing,
    Collecting,
    Finalising,
    Committed,
    Aborted,
}

impl FlowStep {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Aborted)
    }
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initialising => "INITIALISING",
            Self::Handling => "HANDLING",
            Self::Building => "BUILDING",
            Self::Signing => "SIGNING",
            Self::Collecting => "COLLECTING",
            Self::Finalising => "FINALISING",
            Self::Committed => "COMMITTED",
            Self::Aborted => "ABORTED",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub struct ProgressTracker {
    flow: &'static str,
    history: Vec<FlowStep>,
}

impl ProgressTracker {
    pub fn new(flow: &'static str) -> Self {
        Self {
            flow,
            history: Vec::new(),
        }
    }

    pub fn flow(&self) -> &'static str {
        self.flow
    }

    /// Move to `step`. Steps after a terminal step are ignored.
    pub fn set(&mut self, step: FlowStep) {
        if self.is_finished() {
            return;
        }
        info!(flow = self.flow, %step, "flow step");
        self.history.push(step);
    }

    /// Close the flow as aborted, recording why.
    pub fn abort(&mut self, reason: &dyn fmt::Display) {
        if self.is_finished() {
            return;
        }
        warn!(flow = self.flow, from = ?self.current(), %reason, "flow aborted");
        self.history.push(FlowStep::Aborted);
    }

    pub fn current(&self) -> Option<FlowStep> {
        self.history.last().copied()
    }

    pub fn history(&self) -> &[FlowStep] {
        &self.history
    }

    pub fn is_finished(&self) -> bool {
        self.current().is_some_and(FlowStep::is_terminal)
    }
}
