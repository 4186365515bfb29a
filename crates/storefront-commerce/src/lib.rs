//! Cart and checkout state engine for the storefront.
//!
//! - **Money**: integer minor-unit amounts, formatting, percentage math
//! - **Cart**: stock-clamped cart lines, derived totals, coupon evaluation
//! - **Checkout**: snapshot-based checkout session, shipping policy, order
//!   submission
//!
//! Cart state is persisted per session through `storefront-cache`.
//!
//! # Example
//!
//! ```rust,ignore
//! use storefront_cache::{Cache, SessionId};
//! use storefront_commerce::prelude::*;
//!
//! let config = CommerceConfig::load("commerce.toml")?;
//! let cart = config.open_cart(Cache::in_memory(), SessionId::generate())?;
//!
//! let lamp = ProductSnapshot::new("lamp-1", "Desk Lamp", Money::new(10000, Currency::USD), 3);
//! let outcome = cart.add_item(&lamp, 5)?;
//! assert_eq!(outcome.granted, 3);
//!
//! let checkout = CheckoutSession::new(cart.clone(), &config);
//! checkout.apply_coupon("SAVE10")?;
//! checkout.begin_checkout()?;
//! checkout.set_shipping_address(address)?;
//! checkout.set_payment_method(PaymentMethod::CashOnDelivery)?;
//!
//! let confirmation = checkout.submit(&order_api).await?;
//! println!("Order {} placed", confirmation.order_id);
//! ```

pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod ids;
pub mod money;

pub use config::CommerceConfig;
pub use error::CommerceError;
pub use ids::*;
pub use money::{Currency, Money};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::CommerceConfig;
    pub use crate::error::CommerceError;
    pub use crate::ids::*;
    pub use crate::money::{discount_percent, Currency, Money};

    // Cart
    pub use crate::cart::{
        AddOutcome, CartLine, CartState, CartStore, CartTotals, CouponApplication, CouponOutcome,
        CouponRule, CouponTable, PriceBreakdown, ProductSnapshot,
    };

    // Checkout
    pub use crate::checkout::{
        Address, CheckoutPhase, CheckoutSession, CheckoutSnapshot, InMemoryOrderApi, OrderApi,
        OrderApiError, OrderConfirmation, OrderReceipt, OrderRequest, PaymentMethod,
        ShippingPolicy,
    };
}
