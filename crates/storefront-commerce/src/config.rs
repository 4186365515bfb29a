//! Engine configuration.

use crate::cart::{CartState, CartStore, CouponTable};
use crate::checkout::ShippingPolicy;
use crate::error::CommerceError;
use crate::money::Currency;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use storefront_cache::{Cache, SessionId, SessionStore};

/// Configuration for the cart and checkout engine.
///
/// Every section has defaults, so an empty file is a valid configuration.
///
/// ```toml
/// currency = "USD"
///
/// [shipping]
/// free_shipping_threshold = 5000
/// flat_fee = 599
///
/// [[coupons]]
/// code = "SAVE10"
/// percent_off = 10
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommerceConfig {
    /// Currency carts are priced in.
    #[serde(default)]
    pub currency: Currency,

    /// Shipping fee policy.
    #[serde(default)]
    pub shipping: ShippingPolicy,

    /// Checkout settings.
    #[serde(default)]
    pub checkout: CheckoutConfig,

    /// Cart persistence settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Accepted coupon codes. Replaces the built-in table when present.
    #[serde(default)]
    pub coupons: CouponTable,
}

impl CommerceConfig {
    /// Load config from a file; `.json` files are JSON, anything else TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CommerceError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CommerceError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| {
                CommerceError::Config(format!("failed to parse JSON {}: {}", path.display(), e))
            })?
        } else {
            toml::from_str(&content).map_err(|e| {
                CommerceError::Config(format!("failed to parse TOML {}: {}", path.display(), e))
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate TOML config.
    pub fn from_toml_str(content: &str) -> Result<Self, CommerceError> {
        let config: Self =
            toml::from_str(content).map_err(|e| CommerceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Session store for carts under the configured namespace.
    pub fn cart_session_store(&self, cache: Cache) -> SessionStore<CartState> {
        SessionStore::new(cache, self.persistence.namespace.clone())
    }

    /// Open the persisted cart of `session` in the configured currency.
    pub fn open_cart(&self, cache: Cache, session: SessionId) -> Result<CartStore, CommerceError> {
        CartStore::open(self.cart_session_store(cache), session, self.currency)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), CommerceError> {
        self.shipping.validate()?;
        self.coupons.validate()?;
        if self.checkout.submit_timeout_ms == 0 {
            return Err(CommerceError::Config(
                "checkout.submit_timeout_ms must be positive".to_string(),
            ));
        }
        if self.persistence.namespace.trim().is_empty() {
            return Err(CommerceError::Config(
                "persistence.namespace must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Checkout settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// How long to wait for the order API before failing a submission.
    #[serde(default = "default_submit_timeout_ms")]
    pub submit_timeout_ms: u64,
}

impl CheckoutConfig {
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            submit_timeout_ms: default_submit_timeout_ms(),
        }
    }
}

fn default_submit_timeout_ms() -> u64 {
    10_000
}

/// Cart persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Key prefix for persisted carts.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
        }
    }
}

fn default_namespace() -> String {
    "cart".to_string()
}
