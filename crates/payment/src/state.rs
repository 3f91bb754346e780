//! Payment flow state machine.

use serde::{Deserialize, Serialize};

/// The state of one payment flow, tracked per correlation ID.
///
/// State transitions:
/// ```text
/// Unstarted ──► Started ──► ResultAvailable ──► Confirmed
///                 ▲   │
///                 └───┘ (retried start)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FlowState {
    /// No flow has been started for the correlation ID.
    #[default]
    Unstarted,

    /// The customer was sent to the payment provider.
    Started,

    /// The provider returned a definitive set of transactions.
    ResultAvailable,

    /// The payment was confirmed with the provider (terminal state).
    Confirmed,
}

impl FlowState {
    /// Returns true if a flow may be (re)started.
    pub fn can_start(&self) -> bool {
        matches!(self, FlowState::Unstarted | FlowState::Started)
    }

    /// Returns true if the flow result may be fetched from the gateway.
    pub fn can_fetch_result(&self) -> bool {
        matches!(self, FlowState::Started)
    }

    /// Returns true if the result may be confirmed.
    pub fn can_confirm(&self) -> bool {
        matches!(self, FlowState::ResultAvailable)
    }

    /// Returns true if moving to `next` is allowed.
    pub fn can_transition_to(&self, next: FlowState) -> bool {
        matches!(
            (self, next),
            (FlowState::Unstarted, FlowState::Started)
                | (FlowState::Started, FlowState::Started)
                | (FlowState::Started, FlowState::ResultAvailable)
                | (FlowState::ResultAvailable, FlowState::Confirmed)
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Confirmed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowState::Unstarted => "Unstarted",
            FlowState::Started => "Started",
            FlowState::ResultAvailable => "ResultAvailable",
            FlowState::Confirmed => "Confirmed",
        }
    }
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
