//! Order submission contract.
//!
//! The checkout session is the only caller of [`OrderApi`]. Requests carry an
//! idempotency key that stays the same for every retry of one checkout
//! snapshot, so a backend can tell a retry from a second order.

use crate::checkout::{Address, PaymentMethod};
use crate::ids::{CheckoutId, IdempotencyKey, OrderId, ProductId};
use crate::money::{Currency, Money};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// One line of a submitted order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    /// Product identifier.
    pub product_id: ProductId,
    /// Product name at checkout time.
    pub name: String,
    /// Variant descriptor.
    pub variant: Option<String>,
    /// Quantity.
    pub quantity: u32,
    /// Unit price the customer agreed to.
    pub unit_price: Money,
    /// `unit_price * quantity`.
    pub line_total: Money,
}

/// Body of the "place order" call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    /// Stable per snapshot; retries reuse it.
    pub idempotency_key: IdempotencyKey,
    /// Checkout attempt this order comes from.
    pub checkout_id: CheckoutId,
    /// Currency of every amount below.
    pub currency: Currency,
    /// Ordered lines.
    pub lines: Vec<OrderLine>,
    /// Sum of line totals.
    pub subtotal: Money,
    /// Coupon discount.
    pub discount: Money,
    /// Applied coupon code.
    pub coupon_code: Option<String>,
    /// Shipping fee.
    pub shipping_fee: Money,
    /// Amount to charge.
    pub grand_total: Money,
    /// Where to ship.
    pub shipping_address: Address,
    /// Billing address; `None` means same as shipping.
    pub billing_address: Option<Address>,
    /// How the customer pays.
    pub payment_method: PaymentMethod,
}

/// Successful response of the order API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderReceipt {
    /// Identifier of the created order.
    pub order_id: OrderId,
}

/// Why an order submission failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderApiError {
    /// The backend answered with an error.
    #[error("Order rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The backend could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// No answer within the submit timeout.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl OrderApiError {
    /// Whether resubmitting the same request may succeed.
    ///
    /// Network errors, timeouts, 408, 429 and 5xx are retryable; other
    /// rejections need the customer to change something first.
    pub fn is_retryable(&self) -> bool {
        match self {
            OrderApiError::Rejected { status, .. } => {
                matches!(status, 408 | 429) || (500..600).contains(status)
            }
            OrderApiError::Network(_) | OrderApiError::Timeout(_) => true,
        }
    }
}

/// The external order service.
#[async_trait]
pub trait OrderApi: Send + Sync {
    /// Create an order.
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderReceipt, OrderApiError>;
}

/// Order API kept in process memory, for development and tests.
///
/// Repeating an idempotency key returns the order created the first time.
/// Failures queued with [`InMemoryOrderApi::fail_next`] are returned before
/// any order is created.
#[derive(Debug, Default)]
pub struct InMemoryOrderApi {
    inner: Mutex<InMemoryOrders>,
}

#[derive(Debug, Default)]
struct InMemoryOrders {
    by_key: HashMap<IdempotencyKey, OrderId>,
    requests: Vec<OrderRequest>,
    failures: VecDeque<OrderApiError>,
}

impl InMemoryOrderApi {
    /// Create an empty order API.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call fail with `error`.
    pub fn fail_next(&self, error: OrderApiError) {
        self.lock().failures.push_back(error);
    }

    /// Every request received so far, failed ones included.
    pub fn requests(&self) -> Vec<OrderRequest> {
        self.lock().requests.clone()
    }

    /// Number of distinct orders created.
    pub fn order_count(&self) -> usize {
        self.lock().by_key.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryOrders> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl OrderApi for InMemoryOrderApi {
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderReceipt, OrderApiError> {
        let mut orders = self.lock();
        orders.requests.push(request.clone());

        if let Some(error) = orders.failures.pop_front() {
            return Err(error);
        }

        let order_id = orders
            .by_key
            .entry(request.idempotency_key.clone())
            .or_insert_with(OrderId::generate)
            .clone();
        debug!(
            order_id = %order_id,
            idempotency_key = %request.idempotency_key,
            "in-memory order placed"
        );
        Ok(OrderReceipt { order_id })
    }
}
