//! Commerce error types.

use crate::checkout::{CheckoutPhase, OrderApiError};
use crate::ids::ProductId;
use storefront_cache::CacheError;
use thiserror::Error;

/// Errors that can occur in cart and checkout operations.
///
/// Expected user-input outcomes (an unknown coupon code, a quantity above the
/// stock ceiling, removing a line twice) are not errors; they are absorbed
/// by clamping, no-ops, or an explicit outcome value.
#[derive(Error, Debug)]
pub enum CommerceError {
    /// The product has no purchasable stock.
    #[error("Product is out of stock: {product_id}")]
    OutOfStock { product_id: ProductId },

    /// Invalid requested quantity.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// Currency mismatch.
    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: String, got: String },

    /// A submission is already in flight for this checkout.
    #[error("Order submission already in progress")]
    DuplicateSubmission,

    /// The order API rejected the order or could not be reached.
    #[error("Order submission failed: {0}")]
    SubmissionFailed(#[source] OrderApiError),

    /// The requested action is not allowed in the current checkout phase.
    #[error("Cannot {action} while checkout is {phase}")]
    InvalidCheckoutState {
        phase: CheckoutPhase,
        action: &'static str,
    },

    /// Checkout incomplete.
    #[error("Checkout incomplete: missing {0}")]
    CheckoutIncomplete(String),

    /// The cart was cleared after the checkout snapshot was taken.
    #[error("Cart was cleared after checkout began; checkout must start again")]
    SnapshotInvalidated,

    /// Checkout cannot begin with an empty cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Persistence failure.
    #[error("Storage error: {0}")]
    Storage(#[from] CacheError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
