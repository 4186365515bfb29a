//! The cart store handle.

use crate::cart::state::{AddOutcome, CartLine, CartState, CartTotals, ProductSnapshot};
use crate::error::CommerceError;
use crate::ids::ProductId;
use crate::money::Currency;
use std::sync::{Arc, Mutex, MutexGuard};
use storefront_cache::{SessionId, SessionStore};
use tracing::{debug, info, warn};

/// Owns the cart lines for one shopping session.
///
/// Cloning yields another handle to the same cart. A store opened with
/// [`CartStore::open`] writes every mutation through to the session store and
/// replays it on the newest persisted cart when another tab wrote first.
///
/// Mutations either apply fully or not at all.
///
/// # Example
///
/// ```rust,ignore
/// let cart = CartStore::new(Currency::USD);
/// let outcome = cart.add_item(&product, 5)?;
/// if outcome.was_clamped() {
///     println!("Only {} available", outcome.line.quantity);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CartStore {
    inner: Arc<Mutex<CartInner>>,
}

#[derive(Debug)]
struct CartInner {
    state: CartState,
    persistence: Option<Persistence>,
}

#[derive(Debug)]
struct Persistence {
    store: SessionStore<CartState>,
    session: SessionId,
    /// The persisted record has been read or written through this handle.
    synced: bool,
}

impl CartStore {
    /// Create an empty, in-memory cart.
    pub fn new(currency: Currency) -> Self {
        Self::from_inner(CartInner {
            state: CartState::new(currency),
            persistence: None,
        })
    }

    /// Open the persisted cart of `session`, or an empty one.
    pub fn open(
        store: SessionStore<CartState>,
        session: SessionId,
        currency: Currency,
    ) -> Result<Self, CommerceError> {
        let loaded = store.load(&session)?;
        let synced = loaded.is_some();
        let state = match loaded {
            Some(record) => {
                let mut state = record.data;
                normalize(&mut state, currency);
                state
            }
            None => CartState::new(currency),
        };
        info!(
            session = %session,
            lines = state.lines.len(),
            "opened cart"
        );
        Ok(Self::from_inner(CartInner {
            state,
            persistence: Some(Persistence {
                store,
                session,
                synced,
            }),
        }))
    }

    fn from_inner(inner: CartInner) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Add `requested` units of `product`.
    ///
    /// Merges into an existing line for the same product and clamps to stock.
    /// Fails with `OutOfStock` when the product has no stock.
    pub fn add_item(
        &self,
        product: &ProductSnapshot,
        requested: u32,
    ) -> Result<AddOutcome, CommerceError> {
        let outcome = self.mutate(|state| state.add(product, requested))?;
        debug!(
            product_id = %product.id,
            requested,
            granted = outcome.granted,
            quantity = outcome.line.quantity,
            "added to cart"
        );
        if outcome.was_clamped() {
            debug!(
                product_id = %product.id,
                stock = outcome.line.stock_ceiling,
                "requested quantity clamped to stock"
            );
        }
        Ok(outcome)
    }

    /// Set a line's quantity, clamped to its stock ceiling.
    ///
    /// Zero or negative removes the line. Returns the resulting line, or
    /// `None` when the line was removed or never existed.
    pub fn update_quantity(
        &self,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<Option<CartLine>, CommerceError> {
        let line = self.mutate(|state| Ok(state.set_quantity(product_id, quantity)))?;
        debug!(
            product_id = %product_id,
            requested = quantity,
            quantity = line.as_ref().map(|l| l.quantity).unwrap_or(0),
            "updated cart quantity"
        );
        Ok(line)
    }

    /// Remove a line. Removing a missing line is a no-op.
    pub fn remove_item(&self, product_id: &ProductId) -> Result<bool, CommerceError> {
        let removed = self.mutate(|state| Ok(state.remove(product_id)))?;
        debug!(product_id = %product_id, removed, "removed from cart");
        Ok(removed)
    }

    /// Empty the cart.
    ///
    /// Any checkout snapshot taken before this point can no longer be
    /// submitted.
    pub fn clear(&self) -> Result<(), CommerceError> {
        let epoch = self.mutate(|state| {
            state.clear();
            Ok(state.epoch)
        })?;
        info!(epoch, "cleared cart");
        Ok(())
    }

    /// Empty the cart on logout.
    ///
    /// The persisted record is overwritten with an empty cart rather than
    /// deleted, so other tabs see the logout as a clear and the epoch never
    /// restarts.
    pub fn discard(&self) -> Result<(), CommerceError> {
        let epoch = self.mutate(|state| {
            state.clear();
            Ok(state.epoch)
        })?;
        info!(epoch, "discarded cart");
        Ok(())
    }

    /// Re-read the persisted cart, picking up writes from other tabs.
    pub fn reload(&self) -> Result<(), CommerceError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let Some(p) = inner.persistence.as_mut() else {
            return Ok(());
        };
        match p.store.load(&p.session)? {
            Some(record) => {
                let mut state = record.data;
                normalize(&mut state, inner.state.currency);
                inner.state = state;
                p.synced = true;
            }
            // A record we have seen is gone: the cart was discarded.
            None if p.synced => {
                inner.state.clear();
                p.synced = false;
                info!(epoch = inner.state.epoch, "persisted cart disappeared");
            }
            None => {}
        }
        Ok(())
    }

    /// A copy of the current cart.
    pub fn state(&self) -> CartState {
        self.lock().state.clone()
    }

    /// Aggregates recomputed from the current lines.
    pub fn totals(&self) -> CartTotals {
        self.lock().state.totals()
    }

    /// The line for a product, if any.
    pub fn line(&self, product_id: &ProductId) -> Option<CartLine> {
        self.lock().state.line(product_id).cloned()
    }

    /// Check if cart is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().state.is_empty()
    }

    /// Number of times the cart has been cleared.
    pub fn epoch(&self) -> u64 {
        self.lock().state.epoch
    }

    /// Currency the cart is priced in.
    pub fn currency(&self) -> Currency {
        self.lock().state.currency
    }

    /// Session the cart is persisted under, if any.
    pub fn session_id(&self) -> Option<SessionId> {
        self.lock().persistence.as_ref().map(|p| p.session.clone())
    }

    /// Apply `op` to a copy of the cart (or to the newest persisted cart) and
    /// commit only if it succeeds.
    fn mutate<R>(
        &self,
        mut op: impl FnMut(&mut CartState) -> Result<R, CommerceError>,
    ) -> Result<R, CommerceError> {
        let mut inner = self.lock();
        let currency = inner.state.currency;
        let epoch = inner.state.epoch;

        let (next, output) = match &inner.persistence {
            None => {
                let mut next = inner.state.clone();
                let output = op(&mut next)?;
                (next, output)
            }
            Some(p) => {
                // Reseeding a record this handle has seen counts as a clear.
                let epoch = if p.synced { epoch + 1 } else { epoch };
                let init = || CartState {
                    currency,
                    lines: Vec::new(),
                    epoch,
                };
                let (record, output) = p.store.update_with(&p.session, init, |state| {
                    normalize(state, currency);
                    op(state)
                })?;
                (record.data, output)
            }
        };

        if let Some(p) = inner.persistence.as_mut() {
            p.synced = true;
        }
        inner.state = next;
        Ok(output)
    }

    fn lock(&self) -> MutexGuard<'_, CartInner> {
        // State is only ever replaced whole, so a poisoned lock still holds a
        // consistent cart.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Bring persisted state in line with the store's currency and invariants.
fn normalize(state: &mut CartState, currency: Currency) {
    if state.currency != currency {
        warn!(
            stored = %state.currency,
            expected = %currency,
            "persisted cart has a different currency, dropping its lines"
        );
        state.currency = currency;
    }
    state.sanitize();
}
