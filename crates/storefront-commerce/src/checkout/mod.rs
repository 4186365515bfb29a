//! Checkout module.
//!
//! Contains the checkout session, shipping policy, addresses, and the order
//! submission contract.

mod address;
mod order;
mod session;
mod shipping;

pub use address::{Address, PaymentMethod};
pub use order::{InMemoryOrderApi, OrderApi, OrderApiError, OrderLine, OrderReceipt, OrderRequest};
pub use session::{CheckoutPhase, CheckoutSession, CheckoutSnapshot, OrderConfirmation};
pub use shipping::{ShippingPolicy, DEFAULT_FLAT_FEE, DEFAULT_FREE_SHIPPING_THRESHOLD};
