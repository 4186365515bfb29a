//! Price breakdown shown on the cart page and frozen into checkout snapshots.

use crate::cart::coupon::CouponApplication;
use crate::cart::state::CartState;
use crate::checkout::ShippingPolicy;
use crate::money::{discount_percent, Money};
use serde::{Deserialize, Serialize};

/// Complete pricing breakdown for a cart.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    /// Sum of line totals.
    pub subtotal: Money,
    /// Savings from compare-at prices.
    pub savings: Money,
    /// Coupon discount, never above `subtotal`.
    pub discount: Money,
    /// Shipping fee for `subtotal`.
    pub shipping_fee: Money,
    /// `subtotal - discount + shipping_fee`.
    pub grand_total: Money,
}

impl PriceBreakdown {
    /// Price `cart` with an optional coupon under `shipping`.
    ///
    /// Shipping is charged on the pre-discount subtotal.
    pub fn compute(
        cart: &CartState,
        coupon: Option<&CouponApplication>,
        shipping: &ShippingPolicy,
    ) -> Self {
        let subtotal = cart.subtotal();
        let discount = coupon
            .map(|c| c.discount_against(subtotal))
            .unwrap_or_else(|| Money::zero(cart.currency));
        let shipping_fee = shipping.fee(subtotal);
        let grand_total = Money::new(
            subtotal
                .amount_cents
                .saturating_sub(discount.amount_cents)
                .saturating_add(shipping_fee.amount_cents),
            cart.currency,
        );

        Self {
            subtotal,
            savings: cart.total_savings(),
            discount,
            shipping_fee,
            grand_total,
        }
    }

    /// Check if a coupon discount applies.
    pub fn has_discount(&self) -> bool {
        self.discount.is_positive()
    }

    /// Whole-percent coupon discount of the subtotal.
    pub fn discount_percentage(&self) -> u32 {
        let after = Money::new(
            self.subtotal.amount_cents - self.discount.amount_cents,
            self.subtotal.currency,
        );
        discount_percent(self.subtotal, after)
    }
}
