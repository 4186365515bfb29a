//! Flat-rate shipping with a free-shipping threshold.

use crate::error::CommerceError;
use crate::money::Money;
use serde::{Deserialize, Serialize};

/// Default subtotal (minor units) at which shipping becomes free.
pub const DEFAULT_FREE_SHIPPING_THRESHOLD: i64 = 5000;

/// Default flat fee (minor units) below the threshold.
pub const DEFAULT_FLAT_FEE: i64 = 599;

/// Maps a subtotal to a shipping fee.
///
/// Amounts are minor units of whatever currency the subtotal is in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShippingPolicy {
    /// A subtotal at or above this ships free.
    pub free_shipping_threshold: i64,
    /// Fee charged below the threshold.
    pub flat_fee: i64,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            free_shipping_threshold: DEFAULT_FREE_SHIPPING_THRESHOLD,
            flat_fee: DEFAULT_FLAT_FEE,
        }
    }
}

impl ShippingPolicy {
    /// Create a policy.
    pub fn new(free_shipping_threshold: i64, flat_fee: i64) -> Self {
        Self {
            free_shipping_threshold,
            flat_fee,
        }
    }

    /// Shipping fee for `subtotal`.
    pub fn fee(&self, subtotal: Money) -> Money {
        if self.qualifies_for_free_shipping(subtotal) {
            Money::zero(subtotal.currency)
        } else {
            Money::new(self.flat_fee, subtotal.currency)
        }
    }

    /// Check if `subtotal` ships free.
    pub fn qualifies_for_free_shipping(&self, subtotal: Money) -> bool {
        subtotal.amount_cents >= self.free_shipping_threshold
    }

    /// How much more to spend for free shipping; zero once it applies.
    pub fn amount_until_free(&self, subtotal: Money) -> Money {
        let missing = self
            .free_shipping_threshold
            .saturating_sub(subtotal.amount_cents)
            .max(0);
        Money::new(missing, subtotal.currency)
    }

    pub(crate) fn validate(&self) -> Result<(), CommerceError> {
        if self.free_shipping_threshold < 0 {
            return Err(CommerceError::Config(
                "shipping.free_shipping_threshold must not be negative".to_string(),
            ));
        }
        if self.flat_fee < 0 {
            return Err(CommerceError::Config(
                "shipping.flat_fee must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
