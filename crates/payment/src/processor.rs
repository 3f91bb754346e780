//! Payment processor client used by the hosted-page gateway.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cart::{Charge, PaymentQualifier};
use common::{CorrelationId, Money};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Errors returned by a payment processor.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor unavailable: {0}")]
    Unavailable(String),

    #[error("No processor session for {0}")]
    UnknownSession(CorrelationId),

    #[error("No charge {0}")]
    UnknownCharge(String),

    #[error("Charge {reference} cannot be captured in state {state}")]
    NotCapturable { reference: String, state: ChargeState },
}

/// Settlement state of a charge at the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeState {
    Pending,
    Authorized,
    Captured,
    Failed,
}

impl ChargeState {
    /// Returns true once the customer has finished with this charge.
    pub fn is_definitive(&self) -> bool {
        !matches!(self, ChargeState::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeState::Pending => "pending",
            ChargeState::Authorized => "authorized",
            ChargeState::Captured => "captured",
            ChargeState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ChargeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A charge as reported by the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorCharge {
    /// Processor reference of the charge.
    pub reference: String,
    pub method: String,
    pub state: ChargeState,
    pub value: Money,
    pub price: Money,
}

/// Client of an external payment processor with hosted payment pages.
///
/// Sessions are keyed by the checkout's correlation ID. Opening a session
/// again for the same ID and split returns the existing one; a different
/// split replaces it.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Opens a payment session for the split and returns its ID.
    async fn open_session(
        &self,
        correlation_id: &CorrelationId,
        split: &[(PaymentQualifier, Charge)],
    ) -> Result<String, ProcessorError>;

    /// Returns the charges of a session.
    async fn charges(
        &self,
        correlation_id: &CorrelationId,
    ) -> Result<Vec<ProcessorCharge>, ProcessorError>;

    /// Captures an authorized charge.
    async fn capture(
        &self,
        correlation_id: &CorrelationId,
        reference: &str,
    ) -> Result<(), ProcessorError>;
}

#[derive(Debug)]
struct Session {
    id: String,
    charges: Vec<ProcessorCharge>,
}

impl Session {
    fn covers(&self, split: &[(PaymentQualifier, Charge)]) -> bool {
        self.charges.len() == split.len()
            && self.charges.iter().zip(split).all(|(charge, (qualifier, due))| {
                charge.method == qualifier.method
                    && charge.value == due.value
                    && charge.price == due.price
            })
    }
}

#[derive(Debug, Default)]
struct InMemoryProcessorState {
    sessions: HashMap<CorrelationId, Session>,
    next_charge: u32,
    fail_on_open: bool,
    fail_on_capture: bool,
}

/// In-memory payment processor for testing.
///
/// Charges start out pending; tests settle them with [`Self::settle`] or
/// [`Self::authorize_all`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentProcessor {
    state: Arc<RwLock<InMemoryProcessorState>>,
}

impl InMemoryPaymentProcessor {
    /// Creates a new in-memory payment processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the processor to fail when opening sessions.
    pub async fn set_fail_on_open(&self, fail: bool) {
        self.state.write().await.fail_on_open = fail;
    }

    /// Configures the processor to fail when capturing.
    pub async fn set_fail_on_capture(&self, fail: bool) {
        self.state.write().await.fail_on_capture = fail;
    }

    /// Sets the state of every charge of a session, as if the customer
    /// completed the hosted page.
    pub async fn authorize_all(&self, correlation_id: &CorrelationId) {
        if let Some(session) = self.state.write().await.sessions.get_mut(correlation_id) {
            for charge in &mut session.charges {
                charge.state = ChargeState::Authorized;
            }
        }
    }

    /// Sets the state of the charge for `method`.
    pub async fn settle(&self, correlation_id: &CorrelationId, method: &str, state: ChargeState) {
        if let Some(session) = self.state.write().await.sessions.get_mut(correlation_id) {
            for charge in session.charges.iter_mut().filter(|c| c.method == method) {
                charge.state = state;
            }
        }
    }

    /// Returns the number of open sessions.
    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    /// Returns the number of captured charges across all sessions.
    pub async fn captured_count(&self) -> usize {
        self.state
            .read()
            .await
            .sessions
            .values()
            .flat_map(|session| &session.charges)
            .filter(|charge| charge.state == ChargeState::Captured)
            .count()
    }
}

#[async_trait]
impl PaymentProcessor for InMemoryPaymentProcessor {
    async fn open_session(
        &self,
        correlation_id: &CorrelationId,
        split: &[(PaymentQualifier, Charge)],
    ) -> Result<String, ProcessorError> {
        let mut state = self.state.write().await;

        if state.fail_on_open {
            return Err(ProcessorError::Unavailable(
                "session could not be opened".to_string(),
            ));
        }
        if let Some(session) = state.sessions.get(correlation_id) {
            if session.covers(split) {
                return Ok(session.id.clone());
            }
            tracing::debug!(%correlation_id, "payment split changed, replacing processor session");
        }

        let mut charges = Vec::with_capacity(split.len());
        for (qualifier, charge) in split {
            state.next_charge += 1;
            charges.push(ProcessorCharge {
                reference: format!("CHG-{:04}", state.next_charge),
                method: qualifier.method.clone(),
                state: ChargeState::Pending,
                value: charge.value,
                price: charge.price,
            });
        }

        let id = Uuid::new_v4().to_string();
        state.sessions.insert(
            correlation_id.clone(),
            Session {
                id: id.clone(),
                charges,
            },
        );
        Ok(id)
    }

    async fn charges(
        &self,
        correlation_id: &CorrelationId,
    ) -> Result<Vec<ProcessorCharge>, ProcessorError> {
        self.state
            .read()
            .await
            .sessions
            .get(correlation_id)
            .map(|session| session.charges.clone())
            .ok_or_else(|| ProcessorError::UnknownSession(correlation_id.clone()))
    }

    async fn capture(
        &self,
        correlation_id: &CorrelationId,
        reference: &str,
    ) -> Result<(), ProcessorError> {
        let mut state = self.state.write().await;

        if state.fail_on_capture {
            return Err(ProcessorError::Unavailable("capture timed out".to_string()));
        }

        let session = state
            .sessions
            .get_mut(correlation_id)
            .ok_or_else(|| ProcessorError::UnknownSession(correlation_id.clone()))?;
        let charge = session
            .charges
            .iter_mut()
            .find(|charge| charge.reference == reference)
            .ok_or_else(|| ProcessorError::UnknownCharge(reference.to_string()))?;

        match charge.state {
            ChargeState::Authorized => {
                charge.state = ChargeState::Captured;
                Ok(())
            }
            ChargeState::Captured => Ok(()),
            other => Err(ProcessorError::NotCapturable {
                reference: reference.to_string(),
                state: other,
            }),
        }
    }
}
