//! Shopping cart module.
//!
//! Contains the cart lines and store, pricing, and coupon evaluation.

mod coupon;
mod pricing;
mod state;
mod store;

pub use coupon::{CouponApplication, CouponOutcome, CouponRule, CouponTable};
pub use pricing::PriceBreakdown;
pub use state::{AddOutcome, CartLine, CartState, CartTotals, ProductSnapshot};
pub use store::CartStore;
