//! Coupon codes and discount evaluation.

use crate::error::CommerceError;
use crate::money::Money;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One coupon definition.
///
/// Exactly one of `percent_off` and `amount_off` must be set; amounts are in
/// minor units of the cart currency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CouponRule {
    /// Code the customer types (matched case-insensitively).
    pub code: String,
    /// Percentage off the subtotal, `1..=100`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_off: Option<u32>,
    /// Fixed amount off, never more than the subtotal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_off: Option<i64>,
    /// Minimum subtotal for the code to be accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_subtotal: Option<i64>,
}

impl CouponRule {
    /// Create a percentage-off rule.
    pub fn percent(code: impl Into<String>, percent: u32) -> Self {
        Self {
            code: code.into(),
            percent_off: Some(percent),
            amount_off: None,
            minimum_subtotal: None,
        }
    }

    /// Create a fixed-amount rule.
    pub fn fixed(code: impl Into<String>, amount_cents: i64) -> Self {
        Self {
            code: code.into(),
            percent_off: None,
            amount_off: Some(amount_cents),
            minimum_subtotal: None,
        }
    }

    /// Require a minimum subtotal.
    pub fn with_minimum_subtotal(mut self, amount_cents: i64) -> Self {
        self.minimum_subtotal = Some(amount_cents);
        self
    }

    /// Whether `input` names this rule.
    pub fn matches(&self, input: &str) -> bool {
        self.code.trim().eq_ignore_ascii_case(input.trim())
    }

    /// Discount this rule grants against `subtotal`.
    pub fn discount_for(&self, subtotal: Money) -> Money {
        let amount = match (self.percent_off, self.amount_off) {
            (Some(percent), _) => subtotal.percent_of(percent),
            (None, Some(cents)) => Money::new(cents, subtotal.currency),
            (None, None) => Money::zero(subtotal.currency),
        };
        amount.clamp_to(subtotal)
    }

    fn validate(&self) -> Result<(), CommerceError> {
        if self.code.trim().is_empty() {
            return Err(CommerceError::Config("coupon code must not be empty".to_string()));
        }
        match (self.percent_off, self.amount_off) {
            (Some(p), None) if (1..=100).contains(&p) => {}
            (Some(p), None) => {
                return Err(CommerceError::Config(format!(
                    "coupon {}: percent_off {} outside 1..=100",
                    self.code, p
                )))
            }
            (None, Some(a)) if a > 0 => {}
            (None, Some(a)) => {
                return Err(CommerceError::Config(format!(
                    "coupon {}: amount_off {} must be positive",
                    self.code, a
                )))
            }
            _ => {
                return Err(CommerceError::Config(format!(
                    "coupon {}: set exactly one of percent_off, amount_off",
                    self.code
                )))
            }
        }
        if self.minimum_subtotal.is_some_and(|m| m < 0) {
            return Err(CommerceError::Config(format!(
                "coupon {}: minimum_subtotal must not be negative",
                self.code
            )));
        }
        Ok(())
    }
}

/// Result of evaluating a code. A rejected code is an ordinary outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CouponOutcome {
    /// Whether the code was accepted.
    pub accepted: bool,
    /// The code as the customer typed it, trimmed.
    pub code: String,
    /// Discount granted; zero when rejected.
    pub discount_amount: Money,
    /// Why the code was rejected.
    pub reason: Option<String>,
}

impl CouponOutcome {
    fn rejected(code: &str, subtotal: Money, reason: String) -> Self {
        Self {
            accepted: false,
            code: code.to_string(),
            discount_amount: Money::zero(subtotal.currency),
            reason: Some(reason),
        }
    }
}

/// An accepted coupon, held by a checkout session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CouponApplication {
    /// Canonical code from the rule table.
    pub code: String,
    /// Discount locked in when the code was applied.
    pub discount_amount: Money,
    /// Subtotal the discount was computed against.
    pub subtotal_at_application: Money,
}

impl CouponApplication {
    /// Whether the cart subtotal moved since the code was applied.
    pub fn is_stale(&self, current_subtotal: Money) -> bool {
        self.subtotal_at_application != current_subtotal
    }

    /// The locked discount, never more than `subtotal`.
    pub fn discount_against(&self, subtotal: Money) -> Money {
        self.discount_amount.clamp_to(subtotal)
    }
}

/// The fixed rule table codes are checked against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct CouponTable {
    rules: Vec<CouponRule>,
}

impl Default for CouponTable {
    fn default() -> Self {
        Self::new(vec![
            CouponRule::percent("SAVE10", 10),
            CouponRule::percent("SAVE20", 20).with_minimum_subtotal(10000),
            CouponRule::fixed("TAKE5", 500),
        ])
    }
}

impl CouponTable {
    /// Build a table from rules.
    pub fn new(rules: Vec<CouponRule>) -> Self {
        Self { rules }
    }

    /// A table that accepts nothing.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The rules in this table.
    pub fn rules(&self) -> &[CouponRule] {
        &self.rules
    }

    /// Find the rule for a code.
    pub fn find(&self, code: &str) -> Option<&CouponRule> {
        self.rules.iter().find(|r| r.matches(code))
    }

    /// Evaluate `code` against the current `subtotal`.
    pub fn evaluate(&self, code: &str, subtotal: Money) -> CouponOutcome {
        let code = code.trim();
        if code.is_empty() {
            return CouponOutcome::rejected(code, subtotal, "no code entered".to_string());
        }

        let Some(rule) = self.find(code) else {
            debug!(code, "coupon code not recognised");
            return CouponOutcome::rejected(code, subtotal, "unknown code".to_string());
        };

        if let Some(minimum) = rule.minimum_subtotal {
            if subtotal.amount_cents < minimum {
                let needed = Money::new(minimum, subtotal.currency);
                debug!(code, minimum, subtotal = subtotal.amount_cents, "coupon minimum not met");
                return CouponOutcome::rejected(
                    code,
                    subtotal,
                    format!("requires a subtotal of at least {}", needed),
                );
            }
        }

        CouponOutcome {
            accepted: true,
            code: rule.code.clone(),
            discount_amount: rule.discount_for(subtotal),
            reason: None,
        }
    }

    /// Check every rule and reject duplicate codes.
    pub fn validate(&self) -> Result<(), CommerceError> {
        for (i, rule) in self.rules.iter().enumerate() {
            rule.validate()?;
            if self.rules[..i].iter().any(|earlier| earlier.matches(&rule.code)) {
                return Err(CommerceError::Config(format!(
                    "duplicate coupon code {}",
                    rule.code
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;

    fn usd(cents: i64) -> Money {
        Money::new(cents, Currency::USD)
    }

    #[test]
    fn test_percentage_coupon() {
        let outcome = CouponTable::default().evaluate("SAVE10", usd(10000));
        assert!(outcome.accepted);
        assert_eq!(outcome.discount_amount, usd(1000));
        assert_eq!(outcome.reason, None);
    }

    #[test]
    fn test_unknown_code_is_rejected_not_error() {
        let outcome = CouponTable::default().evaluate("BOGUS", usd(10000));
        assert!(!outcome.accepted);
        assert_eq!(outcome.discount_amount, usd(0));
        assert!(outcome.reason.is_some());
    }

    #[test]
    fn test_code_match_ignores_case_and_whitespace() {
        let outcome = CouponTable::default().evaluate("  save10 ", usd(2000));
        assert!(outcome.accepted);
        assert_eq!(outcome.code, "SAVE10");
        assert_eq!(outcome.discount_amount, usd(200));
    }

    #[test]
    fn test_partial_code_does_not_match() {
        assert!(!CouponTable::default().evaluate("SAVE", usd(2000)).accepted);
        assert!(!CouponTable::default().evaluate("SAVE100", usd(2000)).accepted);
    }

    #[test]
    fn test_fixed_coupon_capped_at_subtotal() {
        let outcome = CouponTable::default().evaluate("TAKE5", usd(300));
        assert!(outcome.accepted);
        assert_eq!(outcome.discount_amount, usd(300));
    }

    #[test]
    fn test_minimum_subtotal() {
        let table = CouponTable::default();
        assert!(!table.evaluate("SAVE20", usd(9999)).accepted);

        let outcome = table.evaluate("SAVE20", usd(10000));
        assert!(outcome.accepted);
        assert_eq!(outcome.discount_amount, usd(2000));
    }

    #[test]
    fn test_percentage_rounds_half_away_from_zero() {
        // 10% of 1005 = 100.5
        let outcome = CouponTable::default().evaluate("SAVE10", usd(1005));
        assert_eq!(outcome.discount_amount, usd(101));
    }

    #[test]
    fn test_empty_code() {
        let outcome = CouponTable::default().evaluate("   ", usd(1000));
        assert!(!outcome.accepted);
    }

    #[test]
    fn test_application_staleness_and_clamp() {
        let application = CouponApplication {
            code: "TAKE5".to_string(),
            discount_amount: usd(500),
            subtotal_at_application: usd(4000),
        };
        assert!(!application.is_stale(usd(4000)));
        assert!(application.is_stale(usd(200)));
        assert_eq!(application.discount_against(usd(200)), usd(200));
        assert_eq!(application.discount_against(usd(4000)), usd(500));
    }

    #[test]
    fn test_validate() {
        assert!(CouponTable::default().validate().is_ok());

        let dup = CouponTable::new(vec![
            CouponRule::percent("A", 5),
            CouponRule::fixed("a", 100),
        ]);
        assert!(dup.validate().is_err());

        assert!(CouponTable::new(vec![CouponRule::percent("A", 0)]).validate().is_err());
        assert!(CouponTable::new(vec![CouponRule::percent("A", 101)]).validate().is_err());
        assert!(CouponTable::new(vec![CouponRule::fixed(" ", 100)]).validate().is_err());

        let both = CouponRule {
            percent_off: Some(5),
            ..CouponRule::fixed("B", 100)
        };
        assert!(CouponTable::new(vec![both]).validate().is_err());
    }
}
