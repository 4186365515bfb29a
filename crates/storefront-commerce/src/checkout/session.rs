//! Checkout session state machine.
//!
//! ```text
//! Idle ──begin_checkout──▶ Reviewing ──start_submission──▶ Submitting
//!  ▲                        │  ▲                             │
//!  └────────abort───────────┘  └──── Failed ◀──── error ─────┤
//!  ▲                                                         │
//!  └───────────reset────────── Completed ◀─── accepted ──────┘
//! ```
//!
//! The session prices a frozen [`CheckoutSnapshot`], not the live cart, so the
//! cart may keep changing while the customer reviews and pays.

use crate::cart::{CartLine, CartStore, CouponApplication, CouponOutcome, CouponTable, PriceBreakdown};
use crate::checkout::{
    Address, OrderApi, OrderApiError, OrderLine, OrderReceipt, OrderRequest, PaymentMethod,
    ShippingPolicy,
};
use crate::config::CommerceConfig;
use crate::error::CommerceError;
use crate::ids::{CheckoutId, IdempotencyKey, OrderId};
use crate::money::Currency;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Phases of a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CheckoutPhase {
    /// No checkout in progress; the cart may change freely.
    #[default]
    Idle,
    /// A snapshot is being reviewed; address and payment are collected.
    Reviewing,
    /// The order request is in flight.
    Submitting,
    /// The order was accepted.
    Completed,
    /// The last submission failed; immediately followed by `Reviewing`.
    Failed,
}

impl CheckoutPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutPhase::Idle => "idle",
            CheckoutPhase::Reviewing => "reviewing",
            CheckoutPhase::Submitting => "submitting",
            CheckoutPhase::Completed => "completed",
            CheckoutPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for CheckoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cart contents and prices frozen when checkout began.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSnapshot {
    /// Identifier of this checkout attempt.
    pub checkout_id: CheckoutId,
    /// Sent with every submission of this snapshot.
    pub idempotency_key: IdempotencyKey,
    /// Currency of every amount.
    pub currency: Currency,
    /// Lines as they were at snapshot time.
    pub lines: Vec<CartLine>,
    /// Prices as shown to the customer.
    pub pricing: PriceBreakdown,
    /// Coupon in effect.
    pub coupon: Option<CouponApplication>,
    /// Cart epoch the snapshot belongs to.
    pub cart_epoch: u64,
    /// When the snapshot was taken (Unix timestamp).
    pub taken_at: u64,
}

impl CheckoutSnapshot {
    /// Sum of quantities.
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }
}

/// A placed order, kept for the confirmation page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    /// Identifier the order API assigned.
    pub order_id: OrderId,
    /// What was ordered and charged.
    pub snapshot: CheckoutSnapshot,
}

#[derive(Debug, Default)]
struct SessionState {
    phase: CheckoutPhase,
    coupon: Option<CouponApplication>,
    snapshot: Option<CheckoutSnapshot>,
    shipping_address: Option<Address>,
    billing_address: Option<Address>,
    payment_method: Option<PaymentMethod>,
    confirmation: Option<OrderConfirmation>,
    last_failure: Option<OrderApiError>,
    attempts: u32,
}

impl SessionState {
    fn require(&self, phase: CheckoutPhase, action: &'static str) -> Result<(), CommerceError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(CommerceError::InvalidCheckoutState {
                phase: self.phase,
                action,
            })
        }
    }

    fn transition(&mut self, to: CheckoutPhase) {
        info!(from = %self.phase, to = %to, "checkout phase changed");
        self.phase = to;
    }
}

/// Drives one customer from cart review to a placed order.
///
/// Methods take `&self`; the session can be shared with the UI while a
/// submission is pending, and a second submit during that time is rejected
/// with `DuplicateSubmission`.
pub struct CheckoutSession {
    cart: CartStore,
    coupons: CouponTable,
    shipping: ShippingPolicy,
    submit_timeout: Duration,
    state: Mutex<SessionState>,
}

impl CheckoutSession {
    /// Create an idle session over `cart`.
    pub fn new(cart: CartStore, config: &CommerceConfig) -> Self {
        Self {
            cart,
            coupons: config.coupons.clone(),
            shipping: config.shipping,
            submit_timeout: config.checkout.submit_timeout(),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// The cart this session checks out.
    pub fn cart(&self) -> &CartStore {
        &self.cart
    }

    /// Try a coupon code against the current cart subtotal.
    ///
    /// An accepted code replaces the active coupon; a rejected one leaves it
    /// in place. Only allowed before checkout begins.
    pub fn apply_coupon(&self, code: &str) -> Result<CouponOutcome, CommerceError> {
        let mut state = self.lock();
        state.require(CheckoutPhase::Idle, "apply a coupon")?;

        let subtotal = self.cart.totals().subtotal;
        let outcome = self.coupons.evaluate(code, subtotal);
        if outcome.accepted {
            info!(
                code = %outcome.code,
                discount = outcome.discount_amount.amount_cents,
                "coupon applied"
            );
            state.coupon = Some(CouponApplication {
                code: outcome.code.clone(),
                discount_amount: outcome.discount_amount,
                subtotal_at_application: subtotal,
            });
        } else {
            debug!(code, reason = ?outcome.reason, "coupon rejected");
        }
        Ok(outcome)
    }

    /// Drop the active coupon.
    pub fn remove_coupon(&self) -> Result<Option<CouponApplication>, CommerceError> {
        let mut state = self.lock();
        state.require(CheckoutPhase::Idle, "remove a coupon")?;
        Ok(state.coupon.take())
    }

    /// Price the live cart with the active coupon.
    pub fn quote(&self) -> PriceBreakdown {
        let coupon = self.lock().coupon.clone();
        PriceBreakdown::compute(&self.cart.state(), coupon.as_ref(), &self.shipping)
    }

    /// Freeze the cart and enter `Reviewing`.
    ///
    /// Called again while reviewing, it takes a fresh snapshot with a new
    /// idempotency key and keeps the collected address and payment.
    pub fn begin_checkout(&self) -> Result<CheckoutSnapshot, CommerceError> {
        self.cart.reload()?;

        let mut state = self.lock();
        if !matches!(state.phase, CheckoutPhase::Idle | CheckoutPhase::Reviewing) {
            return Err(CommerceError::InvalidCheckoutState {
                phase: state.phase,
                action: "begin checkout",
            });
        }

        let cart = self.cart.state();
        if cart.is_empty() {
            return Err(CommerceError::EmptyCart);
        }

        let pricing = PriceBreakdown::compute(&cart, state.coupon.as_ref(), &self.shipping);
        if let Some(coupon) = &state.coupon {
            if coupon.is_stale(pricing.subtotal) {
                debug!(
                    code = %coupon.code,
                    applied_at = coupon.subtotal_at_application.amount_cents,
                    subtotal = pricing.subtotal.amount_cents,
                    "cart changed since coupon was applied, keeping locked discount"
                );
            }
        }

        let snapshot = CheckoutSnapshot {
            checkout_id: CheckoutId::generate(),
            idempotency_key: IdempotencyKey::generate(),
            currency: cart.currency,
            lines: cart.lines,
            pricing,
            coupon: state.coupon.clone(),
            cart_epoch: cart.epoch,
            taken_at: current_timestamp(),
        };
        info!(
            checkout_id = %snapshot.checkout_id,
            grand_total = snapshot.pricing.grand_total.amount_cents,
            items = snapshot.item_count(),
            "checkout snapshot taken"
        );

        state.snapshot = Some(snapshot.clone());
        state.last_failure = None;
        state.attempts = 0;
        if state.phase != CheckoutPhase::Reviewing {
            state.transition(CheckoutPhase::Reviewing);
        }
        Ok(snapshot)
    }

    /// Set the shipping address.
    pub fn set_shipping_address(&self, address: Address) -> Result<(), CommerceError> {
        let mut state = self.lock();
        state.require(CheckoutPhase::Reviewing, "set the shipping address")?;
        state.shipping_address = Some(address);
        Ok(())
    }

    /// Set the billing address; `None` bills the shipping address.
    pub fn set_billing_address(&self, address: Option<Address>) -> Result<(), CommerceError> {
        let mut state = self.lock();
        state.require(CheckoutPhase::Reviewing, "set the billing address")?;
        state.billing_address = address;
        Ok(())
    }

    /// Set the payment method.
    pub fn set_payment_method(&self, method: PaymentMethod) -> Result<(), CommerceError> {
        let mut state = self.lock();
        state.require(CheckoutPhase::Reviewing, "set the payment method")?;
        state.payment_method = Some(method);
        Ok(())
    }

    /// Enter `Submitting` and build the order request.
    ///
    /// Fails with `DuplicateSubmission` while a submission is in flight and
    /// with `SnapshotInvalidated` (back to `Idle`) when the cart was cleared
    /// after the snapshot was taken.
    pub fn start_submission(&self) -> Result<OrderRequest, CommerceError> {
        self.cart.reload()?;

        let mut state = self.lock();
        if state.phase == CheckoutPhase::Submitting {
            warn!("order submission already in progress, rejecting duplicate");
            return Err(CommerceError::DuplicateSubmission);
        }
        state.require(CheckoutPhase::Reviewing, "submit")?;

        let Some(snapshot) = state.snapshot.clone() else {
            return Err(CommerceError::InvalidCheckoutState {
                phase: state.phase,
                action: "submit without a snapshot",
            });
        };

        let live_epoch = self.cart.epoch();
        if snapshot.cart_epoch != live_epoch {
            warn!(
                checkout_id = %snapshot.checkout_id,
                snapshot_epoch = snapshot.cart_epoch,
                live_epoch,
                "cart cleared after checkout began, dropping snapshot"
            );
            state.snapshot = None;
            state.transition(CheckoutPhase::Idle);
            return Err(CommerceError::SnapshotInvalidated);
        }

        let shipping_address = state.shipping_address.clone().filter(Address::is_complete);
        let mut missing = Vec::new();
        if shipping_address.is_none() {
            missing.push("shipping address");
        }
        if state.payment_method.is_none() {
            missing.push("payment method");
        }
        let (Some(shipping_address), Some(payment_method)) =
            (shipping_address, state.payment_method.clone())
        else {
            return Err(CommerceError::CheckoutIncomplete(missing.join(", ")));
        };

        let request = build_request(
            &snapshot,
            shipping_address,
            state.billing_address.clone(),
            payment_method,
        );
        state.attempts += 1;
        info!(
            checkout_id = %snapshot.checkout_id,
            attempt = state.attempts,
            "submitting order"
        );
        state.transition(CheckoutPhase::Submitting);
        Ok(request)
    }

    /// Record the order API's answer for the in-flight submission.
    ///
    /// On success the cart is cleared and the confirmation kept. On failure
    /// the session returns to `Reviewing` with the same snapshot.
    pub fn finish_submission(
        &self,
        result: Result<OrderReceipt, OrderApiError>,
    ) -> Result<OrderConfirmation, CommerceError> {
        let confirmation = {
            let mut state = self.lock();
            state.require(CheckoutPhase::Submitting, "finish a submission")?;

            let receipt = match result {
                Ok(receipt) => receipt,
                Err(error) => {
                    warn!(
                        error = %error,
                        retryable = error.is_retryable(),
                        attempt = state.attempts,
                        "order submission failed"
                    );
                    state.transition(CheckoutPhase::Failed);
                    state.last_failure = Some(error.clone());
                    state.transition(CheckoutPhase::Reviewing);
                    return Err(CommerceError::SubmissionFailed(error));
                }
            };

            let Some(snapshot) = state.snapshot.clone() else {
                return Err(CommerceError::InvalidCheckoutState {
                    phase: state.phase,
                    action: "finish a submission without a snapshot",
                });
            };
            let confirmation = OrderConfirmation {
                order_id: receipt.order_id,
                snapshot,
            };
            info!(
                order_id = %confirmation.order_id,
                checkout_id = %confirmation.snapshot.checkout_id,
                "order placed"
            );
            state.confirmation = Some(confirmation.clone());
            state.coupon = None;
            state.last_failure = None;
            state.transition(CheckoutPhase::Completed);
            confirmation
        };

        // The order exists either way; a stale cart is the lesser problem.
        if let Err(e) = self.cart.clear() {
            warn!(error = %e, "failed to clear cart after order was placed");
        }
        Ok(confirmation)
    }

    /// Submit the snapshot through `api`, bounded by the submit timeout.
    pub async fn submit<A>(&self, api: &A) -> Result<OrderConfirmation, CommerceError>
    where
        A: OrderApi + ?Sized,
    {
        let request = self.start_submission()?;
        let result = match tokio::time::timeout(self.submit_timeout, api.place_order(&request)).await
        {
            Ok(result) => result,
            Err(_) => Err(OrderApiError::Timeout(self.submit_timeout)),
        };
        self.finish_submission(result)
    }

    /// Leave `Reviewing` without ordering. The cart is untouched.
    pub fn abort(&self) -> Result<(), CommerceError> {
        let mut state = self.lock();
        match state.phase {
            CheckoutPhase::Idle => Ok(()),
            CheckoutPhase::Reviewing => {
                state.snapshot = None;
                state.last_failure = None;
                state.transition(CheckoutPhase::Idle);
                Ok(())
            }
            phase => Err(CommerceError::InvalidCheckoutState {
                phase,
                action: "abort checkout",
            }),
        }
    }

    /// Start over after a completed order.
    pub fn reset(&self) -> Result<(), CommerceError> {
        let mut state = self.lock();
        match state.phase {
            CheckoutPhase::Idle => Ok(()),
            CheckoutPhase::Completed => {
                *state = SessionState::default();
                info!("checkout session reset");
                Ok(())
            }
            phase => Err(CommerceError::InvalidCheckoutState {
                phase,
                action: "reset checkout",
            }),
        }
    }

    pub fn phase(&self) -> CheckoutPhase {
        self.lock().phase
    }

    pub fn snapshot(&self) -> Option<CheckoutSnapshot> {
        self.lock().snapshot.clone()
    }

    pub fn coupon(&self) -> Option<CouponApplication> {
        self.lock().coupon.clone()
    }

    pub fn confirmation(&self) -> Option<OrderConfirmation> {
        self.lock().confirmation.clone()
    }

    /// The error of the most recent failed submission of this snapshot.
    pub fn last_failure(&self) -> Option<OrderApiError> {
        self.lock().last_failure.clone()
    }

    /// Submissions attempted for the current snapshot.
    pub fn attempts(&self) -> u32 {
        self.lock().attempts
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for CheckoutSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutSession")
            .field("phase", &self.phase())
            .field("submit_timeout", &self.submit_timeout)
            .finish_non_exhaustive()
    }
}

fn build_request(
    snapshot: &CheckoutSnapshot,
    shipping_address: Address,
    billing_address: Option<Address>,
    payment_method: PaymentMethod,
) -> OrderRequest {
    OrderRequest {
        idempotency_key: snapshot.idempotency_key.clone(),
        checkout_id: snapshot.checkout_id.clone(),
        currency: snapshot.currency,
        lines: snapshot
            .lines
            .iter()
            .map(|line| OrderLine {
                product_id: line.product_id.clone(),
                name: line.name.clone(),
                variant: line.variant.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                line_total: line.line_total(),
            })
            .collect(),
        subtotal: snapshot.pricing.subtotal,
        discount: snapshot.pricing.discount,
        coupon_code: snapshot.coupon.as_ref().map(|c| c.code.clone()),
        shipping_fee: snapshot.pricing.shipping_fee,
        grand_total: snapshot.pricing.grand_total,
        shipping_address,
        billing_address,
        payment_method,
    }
}

/// Get current Unix timestamp.
fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
