//! Address and payment selection collected during checkout.
//!
//! Neither is validated beyond presence; format checks belong to the address
//! and payment services.

use serde::{Deserialize, Serialize};

/// A postal address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Recipient name.
    pub name: String,
    /// Address line 1.
    pub line1: String,
    /// Address line 2 (apt, suite, etc.).
    pub line2: Option<String>,
    /// City.
    pub city: String,
    /// State/province code (e.g., "CA").
    pub province_code: Option<String>,
    /// Postal/ZIP code.
    pub postal_code: String,
    /// Country code (e.g., "US").
    pub country_code: String,
    /// Phone number.
    pub phone: Option<String>,
}

impl Address {
    /// Create a new address.
    pub fn new(
        name: impl Into<String>,
        line1: impl Into<String>,
        city: impl Into<String>,
        postal_code: impl Into<String>,
        country_code: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            line1: line1.into(),
            city: city.into(),
            postal_code: postal_code.into(),
            country_code: country_code.into(),
            ..Self::default()
        }
    }

    /// Check if the required fields are filled in.
    pub fn is_complete(&self) -> bool {
        [
            &self.name,
            &self.line1,
            &self.city,
            &self.postal_code,
            &self.country_code,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }
}

/// How the customer pays. Card details arrive already tokenised.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Pay the courier on delivery.
    CashOnDelivery,
    /// Card payment via a processor token.
    Card {
        /// Opaque token from the payment processor.
        token: String,
    },
}

impl PaymentMethod {
    /// Short label for order summaries.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "Cash on delivery",
            PaymentMethod::Card { .. } => "Card",
        }
    }
}
