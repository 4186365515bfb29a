//! Cart lines and the cart aggregate.
//!
//! Every aggregate (item count, subtotal, savings) is a pure function of the
//! line list; nothing derived is stored.

use crate::error::CommerceError;
use crate::ids::ProductId;
use crate::money::{discount_percent, Currency, Money};
use serde::{Deserialize, Serialize};

/// A product as supplied by the product source at add-to-cart time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    /// Product identifier.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Image URL.
    pub image: Option<String>,
    /// Current selling price.
    pub price: Money,
    /// "Was" price, shown struck through when above `price`.
    pub compare_at_price: Option<Money>,
    /// Units in stock.
    pub stock: u32,
    /// Variant descriptor (e.g. "Large / Blue").
    pub variant: Option<String>,
}

impl ProductSnapshot {
    /// Create a snapshot with the required fields.
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image: None,
            price,
            compare_at_price: None,
            stock,
            variant: None,
        }
    }

    /// Set the image URL.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Set the compare-at ("was") price.
    pub fn with_compare_at_price(mut self, price: Money) -> Self {
        self.compare_at_price = Some(price);
        self
    }

    /// Set the variant descriptor.
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    /// Whether any unit can be bought.
    pub fn is_in_stock(&self) -> bool {
        self.stock > 0
    }

    /// Whole-percent markdown for an "x% off" badge.
    pub fn discount_percent(&self) -> u32 {
        self.compare_at_price
            .map(|original| discount_percent(original, self.price))
            .unwrap_or(0)
    }

    /// The original price only if it is a real markdown of the same currency.
    fn effective_original_price(&self) -> Option<Money> {
        self.compare_at_price.filter(|original| {
            original.currency == self.price.currency
                && original.amount_cents > self.price.amount_cents
        })
    }
}

/// One product's presence in the cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Product identifier; unique within the cart.
    pub product_id: ProductId,
    /// Product name (denormalized for display).
    pub name: String,
    /// Image URL (denormalized for display).
    pub image: Option<String>,
    /// Unit price at add time.
    pub unit_price: Money,
    /// Original unit price; always above `unit_price` when present.
    pub original_unit_price: Option<Money>,
    /// Quantity, `1..=stock_ceiling`.
    pub quantity: u32,
    /// Maximum purchasable quantity, from inventory at add time.
    pub stock_ceiling: u32,
    /// Variant descriptor; does not take part in line identity.
    pub variant: Option<String>,
}

impl CartLine {
    fn from_product(product: &ProductSnapshot, quantity: u32) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            image: product.image.clone(),
            unit_price: product.price,
            original_unit_price: product.effective_original_price(),
            quantity,
            stock_ceiling: product.stock,
            variant: product.variant.clone(),
        }
    }

    /// `unit_price * quantity`.
    pub fn line_total(&self) -> Money {
        self.unit_price.saturating_multiply(i64::from(self.quantity))
    }

    /// `(original_unit_price - unit_price) * quantity`, zero without an original price.
    pub fn line_savings(&self) -> Money {
        match self.original_unit_price {
            Some(original) => Money::new(
                original
                    .amount_cents
                    .saturating_sub(self.unit_price.amount_cents)
                    .max(0),
                self.unit_price.currency,
            )
            .saturating_multiply(i64::from(self.quantity)),
            None => Money::zero(self.unit_price.currency),
        }
    }

    /// Whether the quantity already equals the stock ceiling.
    pub fn is_at_stock_limit(&self) -> bool {
        self.quantity >= self.stock_ceiling
    }
}

/// Result of adding a product to the cart.
#[derive(Debug, Clone, PartialEq)]
pub struct AddOutcome {
    /// The line after the add.
    pub line: CartLine,
    /// Units the caller asked for.
    pub requested: u32,
    /// Units actually added.
    pub granted: u32,
}

impl AddOutcome {
    /// True when stock limited the add, so the UI can say "only N available".
    pub fn was_clamped(&self) -> bool {
        self.granted < self.requested
    }
}

/// Aggregates derived from the line list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    /// Sum of quantities.
    pub item_count: u64,
    /// Number of lines.
    pub unique_items: usize,
    /// Sum of `unit_price * quantity`.
    pub subtotal: Money,
    /// Sum of per-line savings.
    pub savings: Money,
}

/// The cart aggregate, as persisted for a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CartState {
    /// Currency every line is priced in.
    pub currency: Currency,
    /// Lines in insertion order.
    pub lines: Vec<CartLine>,
    /// Incremented every time the cart is cleared.
    #[serde(default)]
    pub epoch: u64,
}

impl CartState {
    /// Create an empty cart.
    pub fn new(currency: Currency) -> Self {
        Self {
            currency,
            lines: Vec::new(),
            epoch: 0,
        }
    }

    /// Sum of quantities.
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Sum of line totals.
    pub fn subtotal(&self) -> Money {
        self.lines
            .iter()
            .fold(Money::zero(self.currency), |acc, l| acc.saturating_add(&l.line_total()))
    }

    /// Sum of line savings.
    pub fn total_savings(&self) -> Money {
        self.lines
            .iter()
            .fold(Money::zero(self.currency), |acc, l| acc.saturating_add(&l.line_savings()))
    }

    /// All aggregates at once.
    pub fn totals(&self) -> CartTotals {
        CartTotals {
            item_count: self.item_count(),
            unique_items: self.lines.len(),
            subtotal: self.subtotal(),
            savings: self.total_savings(),
        }
    }

    /// Check if cart is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Get the line for a product.
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.product_id == product_id)
    }

    /// Add `requested` units, merging into an existing line.
    ///
    /// Re-adding refreshes the line's stock ceiling from `product`, since an
    /// add is the point where stock is read from inventory.
    pub(crate) fn add(
        &mut self,
        product: &ProductSnapshot,
        requested: u32,
    ) -> Result<AddOutcome, CommerceError> {
        if requested == 0 {
            return Err(CommerceError::InvalidQuantity(0));
        }
        if product.price.currency != self.currency {
            return Err(CommerceError::CurrencyMismatch {
                expected: self.currency.code().to_string(),
                got: product.price.currency.code().to_string(),
            });
        }
        if !product.is_in_stock() {
            return Err(CommerceError::OutOfStock {
                product_id: product.id.clone(),
            });
        }

        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            let before = line.quantity;
            line.stock_ceiling = product.stock;
            line.quantity = before.saturating_add(requested).min(product.stock);
            return Ok(AddOutcome {
                line: line.clone(),
                requested,
                granted: line.quantity.saturating_sub(before),
            });
        }

        let granted = requested.min(product.stock);
        let line = CartLine::from_product(product, granted);
        self.lines.push(line.clone());
        Ok(AddOutcome {
            line,
            requested,
            granted,
        })
    }

    /// Set a line's quantity, clamped to `1..=stock_ceiling`.
    ///
    /// Zero or negative removes the line. Unknown products are ignored.
    pub(crate) fn set_quantity(&mut self, product_id: &ProductId, quantity: i64) -> Option<CartLine> {
        if quantity <= 0 {
            self.remove(product_id);
            return None;
        }
        let line = self.lines.iter_mut().find(|l| &l.product_id == product_id)?;
        let wanted = u32::try_from(quantity).unwrap_or(u32::MAX);
        line.quantity = wanted.min(line.stock_ceiling).max(1);
        Some(line.clone())
    }

    /// Remove a line. Returns whether anything was removed.
    pub(crate) fn remove(&mut self, product_id: &ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| &l.product_id != product_id);
        self.lines.len() < before
    }

    /// Drop every line and start a new epoch.
    pub(crate) fn clear(&mut self) {
        self.lines.clear();
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Restore the line invariants on state read back from storage.
    ///
    /// Drops lines without stock or in another currency, folds duplicate
    /// product ids into the first occurrence and clamps quantities. A state
    /// that already satisfies the invariants is left untouched.
    pub(crate) fn sanitize(&mut self) {
        let currency = self.currency;
        let mut kept: Vec<CartLine> = Vec::with_capacity(self.lines.len());
        for line in self.lines.drain(..) {
            if line.stock_ceiling == 0 || line.unit_price.currency != currency {
                continue;
            }
            match kept.iter_mut().find(|k| k.product_id == line.product_id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(line.quantity);
                }
                None => kept.push(line),
            }
        }
        for line in &mut kept {
            line.quantity = line.quantity.min(line.stock_ceiling).max(1);
            if line
                .original_unit_price
                .is_some_and(|o| {
                    o.currency != line.unit_price.currency
                        || o.amount_cents <= line.unit_price.amount_cents
                })
            {
                line.original_unit_price = None;
            }
        }
        self.lines = kept;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(cents: i64) -> Money {
        Money::new(cents, Currency::USD)
    }

    fn product(id: &str, price: i64, stock: u32) -> ProductSnapshot {
        ProductSnapshot::new(id, format!("Product {}", id), usd(price), stock)
    }

    #[test]
    fn test_add_new_line() {
        let mut cart = CartState::new(Currency::USD);
        let outcome = cart.add(&product("1", 1000, 5), 2).unwrap();

        assert_eq!(outcome.line.quantity, 2);
        assert!(!outcome.was_clamped());
        assert_eq!(cart.item_count(), 2);
        assert_eq!(cart.lines.len(), 1);
    }

    #[test]
    fn test_add_clamps_to_stock() {
        let mut cart = CartState::new(Currency::USD);
        let outcome = cart.add(&product("1", 10000, 3), 5).unwrap();

        assert_eq!(outcome.line.quantity, 3);
        assert_eq!(outcome.requested, 5);
        assert_eq!(outcome.granted, 3);
        assert!(outcome.was_clamped());
    }

    #[test]
    fn test_add_same_product_merges() {
        let mut cart = CartState::new(Currency::USD);
        let p = product("1", 1000, 4);
        cart.add(&p, 3).unwrap();
        let outcome = cart.add(&p, 3).unwrap();

        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 4);
        assert_eq!(outcome.granted, 1);
        assert!(outcome.was_clamped());
    }

    #[test]
    fn test_add_out_of_stock_creates_nothing() {
        let mut cart = CartState::new(Currency::USD);
        let err = cart.add(&product("1", 1000, 0), 1).unwrap_err();

        assert!(matches!(err, CommerceError::OutOfStock { .. }));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_add_zero_quantity_rejected() {
        let mut cart = CartState::new(Currency::USD);
        let err = cart.add(&product("1", 1000, 5), 0).unwrap_err();
        assert!(matches!(err, CommerceError::InvalidQuantity(0)));
    }

    #[test]
    fn test_add_other_currency_rejected() {
        let mut cart = CartState::new(Currency::USD);
        let p = ProductSnapshot::new("1", "Euro thing", Money::new(1000, Currency::EUR), 5);
        let err = cart.add(&p, 1).unwrap_err();
        assert!(matches!(err, CommerceError::CurrencyMismatch { .. }));
    }

    #[test]
    fn test_compare_at_price_below_price_is_ignored() {
        let mut cart = CartState::new(Currency::USD);
        let p = product("1", 1000, 5).with_compare_at_price(usd(900));
        cart.add(&p, 1).unwrap();
        assert_eq!(cart.lines[0].original_unit_price, None);
    }

    #[test]
    fn test_set_quantity_clamps() {
        let mut cart = CartState::new(Currency::USD);
        let id = ProductId::new("1");
        cart.add(&product("1", 1000, 5), 1).unwrap();

        assert_eq!(cart.set_quantity(&id, 50).unwrap().quantity, 5);
        assert_eq!(cart.set_quantity(&id, 2).unwrap().quantity, 2);
    }

    #[test]
    fn test_set_quantity_zero_or_negative_removes() {
        let mut cart = CartState::new(Currency::USD);
        let id = ProductId::new("1");
        cart.add(&product("1", 1000, 5), 1).unwrap();
        assert!(cart.set_quantity(&id, 0).is_none());
        assert!(cart.is_empty());

        cart.add(&product("1", 1000, 5), 1).unwrap();
        assert!(cart.set_quantity(&id, -3).is_none());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_unknown_is_noop() {
        let mut cart = CartState::new(Currency::USD);
        cart.add(&product("1", 1000, 5), 1).unwrap();
        let before = cart.clone();

        assert!(cart.set_quantity(&ProductId::new("missing"), 3).is_none());
        assert_eq!(cart, before);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut cart = CartState::new(Currency::USD);
        let id = ProductId::new("1");
        cart.add(&product("1", 1000, 5), 1).unwrap();

        assert!(cart.remove(&id));
        assert!(!cart.remove(&id));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_clear_bumps_epoch() {
        let mut cart = CartState::new(Currency::USD);
        cart.add(&product("1", 1000, 5), 1).unwrap();
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.epoch, 1);
    }

    #[test]
    fn test_totals() {
        let mut cart = CartState::new(Currency::USD);
        cart.add(&product("1", 1000, 5).with_compare_at_price(usd(1500)), 2)
            .unwrap();
        cart.add(&product("2", 2000, 5), 1).unwrap();

        let totals = cart.totals();
        assert_eq!(totals.item_count, 3);
        assert_eq!(totals.unique_items, 2);
        assert_eq!(totals.subtotal, usd(4000));
        assert_eq!(totals.savings, usd(1000));
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut cart = CartState::new(Currency::USD);
        for id in ["c", "a", "b"] {
            cart.add(&product(id, 100, 5), 1).unwrap();
        }
        cart.add(&product("a", 100, 5), 1).unwrap();

        let order: Vec<&str> = cart.lines.iter().map(|l| l.product_id.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_sanitize_repairs_tampered_state() {
        let mut cart = CartState::new(Currency::USD);
        cart.add(&product("1", 1000, 3), 2).unwrap();
        cart.add(&product("2", 1000, 3), 1).unwrap();

        let mut tampered = cart.clone();
        tampered.lines.push(cart.lines[0].clone()); // duplicate id
        tampered.lines[1].stock_ceiling = 0; // no stock
        tampered.sanitize();

        assert_eq!(tampered.lines.len(), 1);
        assert_eq!(tampered.lines[0].product_id.as_str(), "1");
        assert_eq!(tampered.lines[0].quantity, 3);
    }

    #[test]
    fn test_sanitize_keeps_valid_state() {
        let mut cart = CartState::new(Currency::USD);
        cart.add(&product("1", 1000, 3).with_compare_at_price(usd(1200)), 2)
            .unwrap();
        cart.add(&product("2", 500, 9), 4).unwrap();

        let mut copy = cart.clone();
        copy.sanitize();
        assert_eq!(copy, cart);
    }

    #[test]
    fn test_product_discount_percent() {
        let p = product("1", 7500, 1).with_compare_at_price(usd(10000));
        assert_eq!(p.discount_percent(), 25);
        assert_eq!(product("2", 7500, 1).discount_percent(), 0);
    }
}
