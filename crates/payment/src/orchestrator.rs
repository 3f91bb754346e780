//! Payment orchestrator driving the checkout payment lifecycle.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cart::{Cart, CartContext, CartService, GuestSession, PaymentRecord, TransactionStatus};
use common::{CorrelationId, OrderNumber};
use tokio::sync::RwLock;
use url::Url;

use crate::error::{PaymentError, Result};
use crate::gateway::{FlowRedirect, FlowResult, PaymentGateway};
use crate::registry::GatewayRegistry;
use crate::state::FlowState;

/// How many confirmed correlation IDs are remembered after their flow is
/// released.
const CONFIRMED_HISTORY: usize = 1024;

/// Default lifetime of an unconfirmed flow.
const DEFAULT_FLOW_TTL: Duration = Duration::from_secs(3600);

/// The outcome of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    pub order_number: OrderNumber,
    pub payment: PaymentRecord,
}

#[derive(Debug, Clone)]
struct FlowAttempt {
    gateway: String,
    state: FlowState,
    record: Option<PaymentRecord>,
    started_at: Instant,
}

/// Flows in progress, plus the most recently confirmed correlation IDs.
#[derive(Debug, Default)]
struct FlowBook {
    active: HashMap<CorrelationId, FlowAttempt>,
    confirmed: HashSet<CorrelationId>,
    confirmed_order: VecDeque<CorrelationId>,
}

impl FlowBook {
    fn live(&self, correlation_id: &CorrelationId, ttl: Duration) -> Option<&FlowAttempt> {
        self.active
            .get(correlation_id)
            .filter(|attempt| attempt.started_at.elapsed() < ttl)
    }

    fn state(&self, correlation_id: &CorrelationId, ttl: Duration) -> FlowState {
        match self.live(correlation_id, ttl) {
            Some(attempt) => attempt.state,
            None if self.confirmed.contains(correlation_id) => FlowState::Confirmed,
            None => FlowState::Unstarted,
        }
    }

    /// Releases a finished flow, keeping only its ID.
    fn release(&mut self, correlation_id: &CorrelationId) {
        self.active.remove(correlation_id);
        if self.confirmed.insert(correlation_id.clone()) {
            self.confirmed_order.push_back(correlation_id.clone());
        }
        while self.confirmed_order.len() > CONFIRMED_HISTORY {
            if let Some(oldest) = self.confirmed_order.pop_front() {
                self.confirmed.remove(&oldest);
            }
        }
    }

    fn prune_expired(&mut self, ttl: Duration) -> usize {
        let before = self.active.len();
        self.active.retain(|_, attempt| attempt.started_at.elapsed() < ttl);
        before - self.active.len()
    }
}

/// Drives a cart's payment through its gateway.
///
/// The orchestrator picks the gateway the cart is bound to, checks that the
/// split covers the cart total, and walks the flow for one correlation ID
/// through start, result, order placement and confirmation:
///
/// ```text
/// start_flow ──► get_flow_result ──► place_order (confirms)
///                                └─► confirm_result
/// ```
///
/// Confirmed flows are released and only their IDs are remembered; flows
/// left unconfirmed are dropped once they outlive the flow TTL. It never
/// changes the payment selection.
pub struct PaymentOrchestrator {
    registry: GatewayRegistry,
    cart_service: Arc<CartService>,
    flow_ttl: Duration,
    flows: RwLock<FlowBook>,
}

/// Times one gateway step.
async fn timed<F: Future>(operation: &'static str, fut: F) -> F::Output {
    let started = Instant::now();
    let output = fut.await;
    metrics::histogram!("payment_flow_step_duration_seconds", "step" => operation)
        .record(started.elapsed().as_secs_f64());
    output
}

/// Runs one gateway step, raced against cancellation and timed.
async fn step<T, F>(ctx: &CartContext, operation: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    timed(operation, ctx.run_until_cancelled(fut))
        .await
        .map_err(|_| PaymentError::Cancelled { operation })?
}

/// Logs a failed public operation.
fn observe<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        tracing::error!(operation, class = e.class().as_str(), error = %e, "payment operation failed");
    }
    result
}

fn ensure_same_gateway(attempt: &FlowAttempt, gateway: &dyn PaymentGateway) -> Result<()> {
    if attempt.gateway != gateway.code() {
        return Err(PaymentError::GatewayMismatch {
            expected: attempt.gateway.clone(),
            actual: gateway.code().to_string(),
        });
    }
    Ok(())
}

/// Returns true if the record still pays the cart as it is now.
fn record_matches_cart(record: &PaymentRecord, cart: &Cart) -> bool {
    record.total_value() == cart.grand_total()
        && cart
            .payment_selection()
            .is_some_and(|selection| record.matches_split(selection))
}

impl PaymentOrchestrator {
    /// Creates a new orchestrator.
    pub fn new(registry: GatewayRegistry, cart_service: Arc<CartService>) -> Self {
        Self {
            registry,
            cart_service,
            flow_ttl: DEFAULT_FLOW_TTL,
            flows: RwLock::new(FlowBook::default()),
        }
    }

    /// Sets how long an unconfirmed flow is kept.
    pub fn with_flow_ttl(mut self, ttl: Duration) -> Self {
        self.flow_ttl = ttl;
        self
    }

    pub fn registry(&self) -> &GatewayRegistry {
        &self.registry
    }

    /// Returns the state of the flow for a correlation ID.
    pub async fn flow_state(&self, correlation_id: &CorrelationId) -> FlowState {
        self.flows.read().await.state(correlation_id, self.flow_ttl)
    }

    /// Number of unconfirmed flows currently held.
    pub async fn active_flow_count(&self) -> usize {
        self.flows.read().await.active.len()
    }

    /// Describes how the flow for the current cart will start.
    #[tracing::instrument(skip(self, ctx, return_url))]
    pub async fn get_start_flow_result(
        &self,
        ctx: &CartContext,
        correlation_id: &CorrelationId,
        return_url: &Url,
    ) -> Result<FlowResult> {
        let result: Result<FlowResult> = async {
            let (cart, gateway) = self.bound_gateway(ctx).await?;
            step(
                ctx,
                "GetStartFlowResult",
                gateway.get_start_flow_result(&cart, correlation_id, return_url),
            )
            .await
        }
        .await;
        observe("GetStartFlowResult", result)
    }

    /// Starts (or restarts) the payment flow.
    ///
    /// A failed start leaves the flow state unchanged.
    #[tracing::instrument(skip(self, ctx, return_url))]
    pub async fn start_flow(
        &self,
        ctx: &CartContext,
        correlation_id: &CorrelationId,
        return_url: &Url,
    ) -> Result<FlowRedirect> {
        let result: Result<FlowRedirect> = async {
            let state = self.flow_state(correlation_id).await;
            if !state.can_start() {
                return Err(PaymentError::InvalidTransition {
                    step: "start",
                    state,
                });
            }

            let (cart, gateway) = self.bound_gateway(ctx).await?;
            let redirect = step(
                ctx,
                "StartFlow",
                gateway.start_flow(&cart, correlation_id, return_url),
            )
            .await?;

            self.advance(correlation_id, gateway.code(), "start", FlowState::Started, None)
                .await?;

            metrics::counter!("payment_flows_started_total", "gateway" => gateway.code().to_string())
                .increment(1);
            tracing::info!(gateway = gateway.code(), cart_id = %cart.id(), "payment flow started");
            Ok(redirect)
        }
        .await;
        observe("StartFlow", result)
    }

    /// Returns the payment record of a started flow.
    ///
    /// The first definitive result is stored; later calls return it without
    /// asking the gateway again.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn get_flow_result(
        &self,
        ctx: &CartContext,
        correlation_id: &CorrelationId,
    ) -> Result<PaymentRecord> {
        let result: Result<PaymentRecord> = async {
            let attempt = self.attempt(correlation_id, "fetch the result of").await?;
            if let (FlowState::ResultAvailable, Some(record)) = (attempt.state, &attempt.record) {
                return Ok(record.clone());
            }
            if !attempt.state.can_fetch_result() {
                return Err(PaymentError::InvalidTransition {
                    step: "fetch the result of",
                    state: attempt.state,
                });
            }

            let (cart, gateway) = self.bound_gateway(ctx).await?;
            ensure_same_gateway(&attempt, gateway.as_ref())?;

            let record = step(
                ctx,
                "GetFlowResult",
                gateway.get_flow_result(&cart, correlation_id),
            )
            .await?;

            self.advance(
                correlation_id,
                gateway.code(),
                "fetch the result of",
                FlowState::ResultAvailable,
                Some(record.clone()),
            )
            .await?;

            tracing::info!(
                gateway = gateway.code(),
                transactions = record.transactions.len(),
                total = %record.total_value(),
                "payment result available"
            );
            Ok(record)
        }
        .await;
        observe("GetFlowResult", result)
    }

    /// Confirms the stored result with the gateway.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn confirm_result(
        &self,
        ctx: &CartContext,
        correlation_id: &CorrelationId,
    ) -> Result<()> {
        let result: Result<()> = async {
            let (attempt, record) = self.available_result(correlation_id, "confirm").await?;
            let (cart, gateway) = self.bound_gateway(ctx).await?;
            ensure_same_gateway(&attempt, gateway.as_ref())?;

            step(
                ctx,
                "ConfirmResult",
                gateway.confirm_result(&cart, correlation_id, &record),
            )
            .await?;
            self.mark_confirmed(gateway.code(), correlation_id).await
        }
        .await;
        observe("ConfirmResult", result)
    }

    /// Places the order with the stored payment record, then confirms it.
    ///
    /// Refused while the flow has no result, when a transaction failed, or
    /// when the cart's split changed since the result was fetched. A
    /// changed split drops the flow so it can be started again.
    #[tracing::instrument(skip(self, ctx, session))]
    pub async fn place_order(
        &self,
        ctx: &CartContext,
        session: &mut GuestSession,
        correlation_id: &CorrelationId,
    ) -> Result<PlacedOrder> {
        let result: Result<PlacedOrder> = async {
            let (attempt, record) = self
                .available_result(correlation_id, "place an order for")
                .await?;

            let declined = record.transactions.iter().any(|t| {
                matches!(
                    t.status,
                    TransactionStatus::Failed | TransactionStatus::Cancelled
                )
            });
            if declined {
                return Err(PaymentError::Declined(correlation_id.clone()));
            }

            let (cart, gateway) = self.bound_gateway(ctx).await?;
            ensure_same_gateway(&attempt, gateway.as_ref())?;

            if !record_matches_cart(&record, &cart) {
                self.flows.write().await.active.remove(correlation_id);
                tracing::warn!(
                    cart_id = %cart.id(),
                    paid = %record.total_value(),
                    cart_total = %cart.grand_total(),
                    "payment result is stale, flow dropped"
                );
                return Err(PaymentError::SplitChanged(correlation_id.clone()));
            }

            let order_number = self
                .cart_service
                .place_order(ctx, session, &record)
                .await?;

            // The order is committed: confirmation is no longer cancellable.
            let confirmed = async {
                timed(
                    "ConfirmResult",
                    gateway.confirm_result(&cart, correlation_id, &record),
                )
                .await?;
                self.mark_confirmed(gateway.code(), correlation_id).await
            }
            .await;
            if let Err(e) = confirmed {
                tracing::error!(%order_number, error = %e, "order placed but payment not confirmed");
                return Err(e);
            }

            Ok(PlacedOrder {
                order_number,
                payment: record,
            })
        }
        .await;
        observe("PlaceOrder", result)
    }

    async fn mark_confirmed(&self, gateway: &str, correlation_id: &CorrelationId) -> Result<()> {
        self.advance(correlation_id, gateway, "confirm", FlowState::Confirmed, None)
            .await?;

        metrics::counter!("payment_flows_confirmed_total", "gateway" => gateway.to_string())
            .increment(1);
        tracing::info!(gateway, "payment confirmed");
        Ok(())
    }

    /// Loads the current cart and the gateway it is bound to, and checks
    /// that the split covers the cart total.
    async fn bound_gateway(&self, ctx: &CartContext) -> Result<(Cart, Arc<dyn PaymentGateway>)> {
        let cart = self.cart_service.current_cart(ctx).await?;
        let selection = cart
            .payment_selection()
            .ok_or(PaymentError::NoPaymentSelection)?;

        let gateway = self
            .registry
            .get(selection.gateway())
            .ok_or_else(|| PaymentError::UnknownGateway(selection.gateway().to_string()))?;

        let split_total = selection.total_value();
        let cart_total = cart.grand_total();
        if split_total != cart_total {
            return Err(PaymentError::SplitTotalMismatch {
                split_total,
                cart_total,
            });
        }

        Ok((cart, gateway))
    }

    async fn attempt(
        &self,
        correlation_id: &CorrelationId,
        step: &'static str,
    ) -> Result<FlowAttempt> {
        let flows = self.flows.read().await;
        if let Some(attempt) = flows.live(correlation_id, self.flow_ttl) {
            return Ok(attempt.clone());
        }
        match flows.state(correlation_id, self.flow_ttl) {
            FlowState::Confirmed => Err(PaymentError::InvalidTransition {
                step,
                state: FlowState::Confirmed,
            }),
            _ => Err(PaymentError::UnknownFlow(correlation_id.clone())),
        }
    }

    async fn available_result(
        &self,
        correlation_id: &CorrelationId,
        step: &'static str,
    ) -> Result<(FlowAttempt, PaymentRecord)> {
        let attempt = self.attempt(correlation_id, step).await?;
        match attempt.record.clone() {
            Some(record) if attempt.state.can_confirm() => Ok((attempt, record)),
            _ => Err(PaymentError::InvalidTransition {
                step,
                state: attempt.state,
            }),
        }
    }

    /// Moves a flow to `next`, re-checking the transition under the lock.
    ///
    /// Expired flows are pruned first. A terminal flow is released.
    async fn advance(
        &self,
        correlation_id: &CorrelationId,
        gateway: &str,
        step: &'static str,
        next: FlowState,
        record: Option<PaymentRecord>,
    ) -> Result<()> {
        let mut flows = self.flows.write().await;

        let expired = flows.prune_expired(self.flow_ttl);
        if expired > 0 {
            metrics::counter!("payment_flows_expired_total").increment(expired as u64);
            tracing::debug!(expired, "expired payment flows dropped");
        }

        let state = flows.state(correlation_id, self.flow_ttl);
        if state == FlowState::Unstarted && next != FlowState::Started {
            return Err(PaymentError::UnknownFlow(correlation_id.clone()));
        }
        if !state.can_transition_to(next) {
            return Err(PaymentError::InvalidTransition { step, state });
        }

        tracing::debug!(from = %state, to = %next, "payment flow transition");
        if next.is_terminal() {
            flows.release(correlation_id);
            return Ok(());
        }

        let attempt = flows
            .active
            .entry(correlation_id.clone())
            .or_insert_with(|| FlowAttempt {
                gateway: gateway.to_string(),
                state: FlowState::Unstarted,
                record: None,
                started_at: Instant::now(),
            });
        attempt.state = next;
        attempt.gateway = gateway.to_string();
        if next == FlowState::Started {
            attempt.started_at = Instant::now();
        }
        if record.is_some() {
            attempt.record = record;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cart::{
        CartItem, Charge, InMemoryCartStore, InMemoryEventPublisher, InMemoryProductCatalog,
        PaymentQualifier, PaymentSelection,
    };
    use common::{CartId, Money};

    use super::*;
    use crate::gateway::OfflineGateway;

    fn return_url() -> Url {
        Url::parse("https://shop.example.com/checkout/return").unwrap()
    }

    fn session() -> GuestSession {
        GuestSession::new()
    }

    async fn setup(selection: Option<PaymentSelection>) -> (PaymentOrchestrator, CartContext) {
        let store = InMemoryCartStore::new();
        let ctx = CartContext::guest("s1");
        let mut cart = Cart::new(CartId::new())
            .with_item(CartItem::new("item-1", "mug", 1, Money::from_cents(4000)));
        cart.set_payment_selection(selection);
        store.seed(ctx.identity().clone(), cart).await;

        let cart_service = CartService::builder(
            Arc::new(store),
            Arc::new(InMemoryProductCatalog::new()),
            Arc::new(InMemoryEventPublisher::new()),
        )
        .build();
        let registry = GatewayRegistry::new().with_gateway(Arc::new(OfflineGateway::new()));

        (
            PaymentOrchestrator::new(registry, Arc::new(cart_service)),
            ctx,
        )
    }

    fn offline_selection(amount: i64) -> PaymentSelection {
        PaymentSelection::new("offline").with_charge(
            PaymentQualifier::main("offlinepayment_cashondelivery"),
            Charge::of(Money::from_cents(amount)),
        )
    }

    #[tokio::test]
    async fn test_cart_without_selection() {
        let (orchestrator, ctx) = setup(None).await;
        let result = orchestrator
            .start_flow(&ctx, &CorrelationId::new("c1"), &return_url())
            .await;
        assert!(matches!(result, Err(PaymentError::NoPaymentSelection)));
    }

    #[tokio::test]
    async fn test_unknown_gateway() {
        let selection = PaymentSelection::new("crypto").with_charge(
            PaymentQualifier::main("crypto_btc"),
            Charge::of(Money::from_cents(4000)),
        );
        let (orchestrator, ctx) = setup(Some(selection)).await;

        let result = orchestrator
            .start_flow(&ctx, &CorrelationId::new("c1"), &return_url())
            .await;
        assert!(matches!(result, Err(PaymentError::UnknownGateway(ref code)) if code == "crypto"));
    }

    #[tokio::test]
    async fn test_split_must_cover_cart_total() {
        let (orchestrator, ctx) = setup(Some(offline_selection(3000))).await;
        let id = CorrelationId::new("c1");

        let result = orchestrator.start_flow(&ctx, &id, &return_url()).await;
        assert!(matches!(result, Err(PaymentError::SplitTotalMismatch { .. })));
        assert_eq!(orchestrator.flow_state(&id).await, FlowState::Unstarted);
    }

    #[tokio::test]
    async fn test_flow_walks_forward_only() {
        let (orchestrator, ctx) = setup(Some(offline_selection(4000))).await;
        let id = CorrelationId::new("c1");

        let result = orchestrator.get_flow_result(&ctx, &id).await;
        assert!(matches!(result, Err(PaymentError::UnknownFlow(_))));

        orchestrator.start_flow(&ctx, &id, &return_url()).await.unwrap();
        orchestrator.start_flow(&ctx, &id, &return_url()).await.unwrap();
        assert_eq!(orchestrator.flow_state(&id).await, FlowState::Started);

        let result = orchestrator.confirm_result(&ctx, &id).await;
        assert!(matches!(
            result,
            Err(PaymentError::InvalidTransition {
                state: FlowState::Started,
                ..
            })
        ));

        let first = orchestrator.get_flow_result(&ctx, &id).await.unwrap();
        let second = orchestrator.get_flow_result(&ctx, &id).await.unwrap();
        assert_eq!(first, second);

        let result = orchestrator.start_flow(&ctx, &id, &return_url()).await;
        assert!(matches!(result, Err(PaymentError::InvalidTransition { .. })));

        orchestrator.confirm_result(&ctx, &id).await.unwrap();
        assert_eq!(orchestrator.flow_state(&id).await, FlowState::Confirmed);

        let result = orchestrator.get_flow_result(&ctx, &id).await;
        assert!(matches!(
            result,
            Err(PaymentError::InvalidTransition {
                state: FlowState::Confirmed,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_confirmed_flow_is_released() {
        let (orchestrator, ctx) = setup(Some(offline_selection(4000))).await;
        let id = CorrelationId::new("c1");

        orchestrator.start_flow(&ctx, &id, &return_url()).await.unwrap();
        orchestrator.get_flow_result(&ctx, &id).await.unwrap();
        assert_eq!(orchestrator.active_flow_count().await, 1);

        orchestrator
            .place_order(&ctx, &mut session(), &id)
            .await
            .unwrap();

        assert_eq!(orchestrator.active_flow_count().await, 0);
        assert_eq!(orchestrator.flow_state(&id).await, FlowState::Confirmed);
        let result = orchestrator.start_flow(&ctx, &id, &return_url()).await;
        assert!(matches!(
            result,
            Err(PaymentError::InvalidTransition {
                state: FlowState::Confirmed,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_expired_flows_are_dropped() {
        let (orchestrator, ctx) = setup(Some(offline_selection(4000))).await;
        let orchestrator = orchestrator.with_flow_ttl(Duration::ZERO);
        let first = CorrelationId::new("c1");
        let second = CorrelationId::new("c2");

        orchestrator.start_flow(&ctx, &first, &return_url()).await.unwrap();
        orchestrator.start_flow(&ctx, &second, &return_url()).await.unwrap();

        assert_eq!(orchestrator.active_flow_count().await, 1);
        assert_eq!(orchestrator.flow_state(&first).await, FlowState::Unstarted);
        let result = orchestrator.get_flow_result(&ctx, &first).await;
        assert!(matches!(result, Err(PaymentError::UnknownFlow(_))));
    }

    #[tokio::test]
    async fn test_stale_result_is_not_placed() {
        let (orchestrator, ctx) = setup(Some(offline_selection(4000))).await;
        let id = CorrelationId::new("c1");
        orchestrator.start_flow(&ctx, &id, &return_url()).await.unwrap();
        orchestrator.get_flow_result(&ctx, &id).await.unwrap();

        // Same total, paid in advance instead of on delivery.
        let changed = PaymentSelection::new("offline").with_charge(
            PaymentQualifier::main("offlinepayment_cashinadvance"),
            Charge::of(Money::from_cents(4000)),
        );
        orchestrator
            .cart_service
            .update_payment_selection(&ctx, Some(changed))
            .await
            .unwrap();

        let result = orchestrator.place_order(&ctx, &mut session(), &id).await;
        assert!(matches!(result, Err(PaymentError::SplitChanged(_))));
        assert_eq!(orchestrator.flow_state(&id).await, FlowState::Unstarted);

        orchestrator.start_flow(&ctx, &id, &return_url()).await.unwrap();
        let record = orchestrator.get_flow_result(&ctx, &id).await.unwrap();
        assert_eq!(record.transactions[0].method, "offlinepayment_cashinadvance");
        orchestrator
            .place_order(&ctx, &mut session(), &id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_start_leaves_flow_unstarted() {
        let (orchestrator, ctx) = setup(Some(offline_selection(4000))).await;
        let id = CorrelationId::new("c1");
        ctx.cancellation_token().cancel();

        let result = orchestrator.start_flow(&ctx, &id, &return_url()).await;
        assert!(matches!(
            result,
            Err(PaymentError::Cart(cart::CartError::Cancelled { .. }))
        ));
        assert_eq!(orchestrator.flow_state(&id).await, FlowState::Unstarted);
    }
}
