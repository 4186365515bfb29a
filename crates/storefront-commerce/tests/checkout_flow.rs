//! End-to-end checkout scenarios against test doubles of the order API.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use storefront_cache::{Cache, MemoryBackend, SessionId};
use storefront_commerce::prelude::*;
use tokio::sync::Notify;

fn usd(cents: i64) -> Money {
    Money::new(cents, Currency::USD)
}

fn address() -> Address {
    Address::new("Ada Lovelace", "12 Analytical Row", "London", "N1 9GU", "GB")
}

fn ready_session(cart: CartStore, config: &CommerceConfig) -> CheckoutSession {
    let session = CheckoutSession::new(cart, config);
    session.begin_checkout().unwrap();
    session.set_shipping_address(address()).unwrap();
    session
        .set_payment_method(PaymentMethod::Card {
            token: "tok_visa".to_string(),
        })
        .unwrap();
    session
}

/// Holds every call until released.
#[derive(Default)]
struct GatedOrderApi {
    calls: AtomicUsize,
    gate: Notify,
    seen: Mutex<Vec<OrderRequest>>,
}

impl GatedOrderApi {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl OrderApi for GatedOrderApi {
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderReceipt, OrderApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.clone());
        self.gate.notified().await;
        Ok(OrderReceipt {
            order_id: OrderId::new("ord-gated"),
        })
    }
}

/// Never answers.
struct SilentOrderApi;

#[async_trait]
impl OrderApi for SilentOrderApi {
    async fn place_order(&self, _request: &OrderRequest) -> Result<OrderReceipt, OrderApiError> {
        std::future::pending().await
    }
}

#[test]
fn test_add_beyond_stock_is_clamped() {
    let cart = CartStore::new(Currency::USD);
    let product = ProductSnapshot::new("1", "Camera", usd(10000), 3);

    let outcome = cart.add_item(&product, 5).unwrap();

    assert_eq!(outcome.line.quantity, 3);
    assert!(outcome.was_clamped());
    assert_eq!(outcome.requested, 5);
    assert_eq!(outcome.granted, 3);
}

#[test]
fn test_coupon_scenario() {
    let cart = CartStore::new(Currency::USD);
    cart.add_item(&ProductSnapshot::new("1", "Kettle", usd(5000), 10), 2)
        .unwrap();
    let session = CheckoutSession::new(cart, &CommerceConfig::default());

    let save10 = session.apply_coupon("SAVE10").unwrap();
    assert!(save10.accepted);
    assert_eq!(save10.discount_amount, usd(1000));

    let bogus = session.apply_coupon("BOGUS").unwrap();
    assert!(!bogus.accepted);
    assert_eq!(bogus.discount_amount, usd(0));
}

#[tokio::test]
async fn test_submitted_totals_come_from_snapshot() {
    let config = CommerceConfig::default();
    let cart = CartStore::new(Currency::USD);
    cart.add_item(&ProductSnapshot::new("a", "Boots", usd(10000), 5), 1)
        .unwrap();
    cart.add_item(&ProductSnapshot::new("b", "Socks", usd(5000), 5), 2)
        .unwrap();
    let session = ready_session(cart.clone(), &config);
    assert_eq!(session.snapshot().unwrap().pricing.subtotal, usd(20000));

    // The customer keeps editing the cart in another view.
    cart.update_quantity(&ProductId::new("b"), 1).unwrap();
    assert_eq!(cart.totals().subtotal, usd(15000));

    let api = InMemoryOrderApi::new();
    let confirmation = session.submit(&api).await.unwrap();

    let sent = &api.requests()[0];
    assert_eq!(sent.subtotal, usd(20000));
    assert_eq!(sent.grand_total, usd(20000));
    assert_eq!(sent.lines.len(), 2);
    assert_eq!(sent.lines[1].quantity, 2);
    assert_eq!(confirmation.snapshot.pricing.grand_total, usd(20000));

    assert_eq!(session.phase(), CheckoutPhase::Completed);
    assert!(cart.is_empty());
}

#[tokio::test]
async fn test_double_submit_reaches_api_once() {
    let config = CommerceConfig::default();
    let cart = CartStore::new(Currency::USD);
    cart.add_item(&ProductSnapshot::new("1", "Chair", usd(7500), 4), 1)
        .unwrap();
    let session = ready_session(cart, &config);
    let api = GatedOrderApi::default();

    let (first, second) = tokio::join!(session.submit(&api), async {
        while api.calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(session.phase(), CheckoutPhase::Submitting);
        let result = session.submit(&api).await;
        api.release();
        result
    });

    assert!(matches!(second, Err(CommerceError::DuplicateSubmission)));
    assert_eq!(first.unwrap().order_id.as_str(), "ord-gated");
    assert_eq!(api.calls(), 1);
    assert_eq!(api.seen.lock().unwrap().len(), 1);
    assert_eq!(session.attempts(), 1);
}

#[tokio::test]
async fn test_retry_after_failure_reuses_idempotency_key() {
    let config = CommerceConfig::default();
    let cart = CartStore::new(Currency::USD);
    cart.add_item(&ProductSnapshot::new("1", "Desk", usd(25000), 2), 1)
        .unwrap();
    let session = ready_session(cart.clone(), &config);
    let api = InMemoryOrderApi::new();
    api.fail_next(OrderApiError::Rejected {
        status: 503,
        message: "maintenance".to_string(),
    });

    let err = session.submit(&api).await.unwrap_err();
    assert!(matches!(err, CommerceError::SubmissionFailed(ref e) if e.is_retryable()));
    assert_eq!(session.phase(), CheckoutPhase::Reviewing);
    assert!(session.last_failure().is_some());
    assert!(!cart.is_empty());

    // Address and payment are still there; just submit again.
    let confirmation = session.submit(&api).await.unwrap();
    let requests = api.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].idempotency_key, requests[1].idempotency_key);
    assert_eq!(requests[0], requests[1]);
    assert_eq!(api.order_count(), 1);
    assert_eq!(session.attempts(), 2);
    assert!(session.last_failure().is_none());
    assert_eq!(session.confirmation().unwrap().order_id, confirmation.order_id);
}

#[tokio::test(start_paused = true)]
async fn test_slow_api_times_out() {
    let config = CommerceConfig::from_toml_str("[checkout]\nsubmit_timeout_ms = 2500").unwrap();
    let cart = CartStore::new(Currency::USD);
    cart.add_item(&ProductSnapshot::new("1", "Lamp", usd(1000), 2), 1)
        .unwrap();
    let session = ready_session(cart, &config);

    let err = session.submit(&SilentOrderApi).await.unwrap_err();

    match err {
        CommerceError::SubmissionFailed(OrderApiError::Timeout(after)) => {
            assert_eq!(after, Duration::from_millis(2500))
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(session.phase(), CheckoutPhase::Reviewing);
}

#[tokio::test]
async fn test_clear_in_other_tab_invalidates_checkout() {
    let backend = MemoryBackend::new();
    let config = CommerceConfig::default();
    let session_id = SessionId::new("shopper-1");
    let tab_a = config
        .open_cart(Cache::new(backend.clone()), session_id.clone())
        .unwrap();
    let tab_b = config.open_cart(Cache::new(backend), session_id).unwrap();

    tab_a
        .add_item(&ProductSnapshot::new("1", "Rug", usd(9000), 1), 1)
        .unwrap();
    let session = ready_session(tab_a, &config);

    tab_b.clear().unwrap();

    let api = InMemoryOrderApi::new();
    let err = session.submit(&api).await.unwrap_err();
    assert!(matches!(err, CommerceError::SnapshotInvalidated));
    assert_eq!(session.phase(), CheckoutPhase::Idle);
    assert!(api.requests().is_empty());
}

#[tokio::test]
async fn test_completed_order_clears_persisted_cart() {
    let cache = Cache::in_memory();
    let config = CommerceConfig::default();
    let session_id = SessionId::new("shopper-2");
    let cart = config.open_cart(cache.clone(), session_id.clone()).unwrap();
    cart.add_item(&ProductSnapshot::new("1", "Vase", usd(3000), 5), 2)
        .unwrap();

    let session = ready_session(cart, &config);
    session.submit(&InMemoryOrderApi::new()).await.unwrap();

    let reopened = config.open_cart(cache, session_id).unwrap();
    assert!(reopened.is_empty());

    session.reset().unwrap();
    assert!(matches!(session.begin_checkout(), Err(CommerceError::EmptyCart)));
}

#[tokio::test]
async fn test_coupon_locked_into_order() {
    let config = CommerceConfig::default();
    let cart = CartStore::new(Currency::USD);
    cart.add_item(&ProductSnapshot::new("1", "Coat", usd(6000), 5), 2)
        .unwrap();
    let session = CheckoutSession::new(cart.clone(), &config);
    session.apply_coupon("save20").unwrap();

    // Cart shrinks after the coupon was applied; the discount stays locked.
    cart.update_quantity(&ProductId::new("1"), 1).unwrap();
    let quote = session.quote();
    assert_eq!(quote.discount, usd(2400));
    assert_eq!(quote.grand_total, usd(3600));

    session.begin_checkout().unwrap();
    session.set_shipping_address(address()).unwrap();
    session
        .set_payment_method(PaymentMethod::CashOnDelivery)
        .unwrap();

    let api = InMemoryOrderApi::new();
    session.submit(&api).await.unwrap();
    let sent = &api.requests()[0];
    assert_eq!(sent.coupon_code.as_deref(), Some("SAVE20"));
    assert_eq!(sent.discount, usd(2400));
    assert_eq!(sent.subtotal, usd(6000));
}

#[tokio::test]
async fn test_logout_in_other_tab_then_stale_add_invalidates_checkout() {
    let backend = MemoryBackend::new();
    let config = CommerceConfig::default();
    let session_id = SessionId::new("shopper-3");
    let tab_a = config
        .open_cart(Cache::new(backend.clone()), session_id.clone())
        .unwrap();
    let tab_b = config
        .open_cart(Cache::new(backend), session_id)
        .unwrap();

    tab_a
        .add_item(&ProductSnapshot::new("1", "Rug", usd(9000), 1), 1)
        .unwrap();
    let session = ready_session(tab_a.clone(), &config);

    tab_b.discard().unwrap();
    // Tab A has not reloaded since the logout.
    tab_a
        .add_item(&ProductSnapshot::new("2", "Mat", usd(1500), 3), 1)
        .unwrap();
    assert_eq!(tab_a.epoch(), tab_b.epoch());

    let api = InMemoryOrderApi::new();
    let err = session.submit(&api).await.unwrap_err();
    assert!(matches!(err, CommerceError::SnapshotInvalidated));
    assert_eq!(session.phase(), CheckoutPhase::Idle);
    assert!(api.requests().is_empty());
}

#[tokio::test]
async fn test_new_tab_after_logout_cannot_revive_checkout() {
    let backend = MemoryBackend::new();
    let config = CommerceConfig::default();
    let session_id = SessionId::new("shopper-4");
    let tab_a = config
        .open_cart(Cache::new(backend.clone()), session_id.clone())
        .unwrap();
    tab_a
        .add_item(&ProductSnapshot::new("1", "Rug", usd(9000), 1), 1)
        .unwrap();
    let session = ready_session(tab_a, &config);

    config
        .open_cart(Cache::new(backend.clone()), session_id.clone())
        .unwrap()
        .discard()
        .unwrap();
    let tab_c = config.open_cart(Cache::new(backend), session_id).unwrap();
    tab_c
        .add_item(&ProductSnapshot::new("1", "Rug", usd(9000), 1), 1)
        .unwrap();

    let api = InMemoryOrderApi::new();
    assert!(matches!(
        session.submit(&api).await,
        Err(CommerceError::SnapshotInvalidated)
    ));
    assert!(api.requests().is_empty());
}
