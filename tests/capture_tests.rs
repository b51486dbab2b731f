use order_capture::application::capture::preflight;
use order_capture::config::CaptureConfig;
use order_capture::domain::order::{Order, OrderStatus};
use order_capture::domain::payment::{Payment, PaymentStatus};
use order_capture::domain::instrument::InstrumentRef;
use order_capture::domain::ports::{OrderStore, PaymentStore};
use order_capture::error::{CaptureError, LedgerError};
use order_capture::infrastructure::in_memory::InMemoryLedger;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

mod common;
use common::{FailingPaymentWrites, Harness, Script, ScriptedGateway, credit_card, ebt_card, money};

#[tokio::test]
async fn test_all_payments_succeed() {
    let h = Harness::new(ScriptedGateway::new(), CaptureConfig::default()).await;
    h.order(1, dec!(100.00), dec!(40.00)).await;
    h.credit_payment(1, 1, dec!(60.00)).await;
    h.ebt_payment(2, 1, dec!(40.00)).await;

    let order = h.reconciler.capture(1).await.unwrap();

    assert_eq!(order.status, OrderStatus::Succeeded);
    assert!(order.success_date.is_some());
    assert_eq!(h.stored_order(1).await, order);
    for id in [1, 2] {
        let payment = h.stored_payment(id).await;
        assert_eq!(payment.status, PaymentStatus::Succeeded);
        assert!(payment.success_date.is_some());
        assert!(payment.last_processing_error.is_none());
    }
    assert_eq!(h.gateway.calls(), vec![1, 2]);
}

#[tokio::test]
async fn test_amount_mismatch_leaves_order_in_draft() {
    let h = Harness::new(ScriptedGateway::new(), CaptureConfig::default()).await;
    h.order(1, dec!(100.00), dec!(40.00)).await;
    h.credit_payment(1, 1, dec!(50.00)).await;
    h.ebt_payment(2, 1, dec!(40.00)).await;

    let result = h.reconciler.capture(1).await;

    match result {
        Err(CaptureError::AmountMismatch {
            order_id,
            payments_total,
            order_total,
        }) => {
            assert_eq!(order_id, 1);
            assert_eq!(payments_total, money(dec!(90.00)));
            assert_eq!(order_total, money(dec!(100.00)));
        }
        other => panic!("expected AmountMismatch, got {other:?}"),
    }
    assert_eq!(h.stored_order(1).await.status, OrderStatus::Draft);
    assert_eq!(h.gateway.call_count(), 0);
    assert_eq!(
        h.stored_payment(1).await.status,
        PaymentStatus::RequiresConfirmation
    );
}

#[tokio::test]
async fn test_eligibility_exceeded_makes_no_gateway_calls() {
    let h = Harness::new(ScriptedGateway::new(), CaptureConfig::default()).await;
    h.order(1, dec!(100.00), dec!(30.00)).await;
    h.ebt_payment(1, 1, dec!(50.00)).await;
    h.credit_payment(2, 1, dec!(50.00)).await;

    let result = h.reconciler.capture(1).await;

    assert!(matches!(
        result,
        Err(CaptureError::EligibilityExceeded { order_id: 1, .. })
    ));
    let order = h.stored_order(1).await;
    assert_eq!(order.status, OrderStatus::Draft);
    assert!(order.success_date.is_none());
    assert_eq!(h.gateway.call_count(), 0);
}

#[tokio::test]
async fn test_one_decline_fails_order_but_keeps_other_outcome() {
    let gateway = ScriptedGateway::with([(2, Script::Decline("card_declined", "insufficient funds"))]);
    let h = Harness::new(gateway, CaptureConfig::default()).await;
    h.order(1, dec!(100.00), dec!(40.00)).await;
    h.credit_payment(1, 1, dec!(60.00)).await;
    h.ebt_payment(2, 1, dec!(40.00)).await;

    let order = h.reconciler.capture(1).await.unwrap();

    assert_eq!(order.status, OrderStatus::Failed);
    assert!(order.success_date.is_none());

    let succeeded = h.stored_payment(1).await;
    assert_eq!(succeeded.status, PaymentStatus::Succeeded);
    assert!(succeeded.success_date.is_some());

    let failed = h.stored_payment(2).await;
    assert_eq!(failed.status, PaymentStatus::Failed);
    assert!(failed.success_date.is_none());
    assert_eq!(
        failed.last_processing_error.as_deref(),
        Some("card_declined: insufficient funds")
    );
    assert_eq!(h.gateway.call_count(), 2);
}

#[tokio::test]
async fn test_unknown_order() {
    let h = Harness::new(ScriptedGateway::new(), CaptureConfig::default()).await;
    h.order(1, dec!(10.00), dec!(0.00)).await;
    h.credit_payment(1, 1, dec!(10.00)).await;

    assert!(matches!(
        h.reconciler.capture(42).await,
        Err(CaptureError::OrderNotFound(42))
    ));
    assert_eq!(h.gateway.call_count(), 0);
    assert_eq!(h.stored_order(1).await.status, OrderStatus::Draft);
}

#[tokio::test]
async fn test_terminal_order_is_not_captured_again() {
    let gateway = ScriptedGateway::with([(1, Script::Decline("card_declined", "do not honor"))]);
    let h = Harness::new(gateway, CaptureConfig::default()).await;
    h.order(1, dec!(10.00), dec!(0.00)).await;
    h.credit_payment(1, 1, dec!(10.00)).await;

    h.reconciler.capture(1).await.unwrap();
    let result = h.reconciler.capture(1).await;

    assert!(matches!(
        result,
        Err(CaptureError::AlreadyFinalized {
            order_id: 1,
            status: OrderStatus::Failed
        })
    ));
    assert_eq!(h.gateway.call_count(), 1);
}

#[tokio::test]
async fn test_captured_records_cannot_be_rewritten() {
    let h = Harness::new(ScriptedGateway::new(), CaptureConfig::default()).await;
    h.order(1, dec!(10.00), dec!(0.00)).await;
    h.credit_payment(1, 1, dec!(10.00)).await;
    let captured = h.reconciler.capture(1).await.unwrap();

    let mut reopened = captured.clone();
    reopened.status = OrderStatus::Draft;
    reopened.success_date = None;
    assert!(matches!(
        OrderStore::update(&h.ledger, reopened).await,
        Err(LedgerError::Finalized { entity: "Order", id: 1, .. })
    ));
    assert_eq!(h.stored_order(1).await, captured);

    let settled = h.stored_payment(1).await;
    let mut rewritten = settled.clone();
    rewritten.status = PaymentStatus::RequiresConfirmation;
    rewritten.success_date = None;
    rewritten.payment_method = InstrumentRef::EbtCard(999);
    rewritten.order = 777;
    assert!(PaymentStore::update(&h.ledger, rewritten).await.is_err());
    assert_eq!(h.stored_payment(1).await, settled);
}

#[tokio::test]
async fn test_empty_order_with_zero_total_succeeds() {
    let h = Harness::new(ScriptedGateway::new(), CaptureConfig::default()).await;
    h.order(1, dec!(0.00), dec!(0.00)).await;

    let order = h.reconciler.capture(1).await.unwrap();
    assert_eq!(order.status, OrderStatus::Succeeded);
    assert_eq!(h.gateway.call_count(), 0);
}

#[tokio::test]
async fn test_settled_payments_are_not_charged_twice() {
    let h = Harness::new(ScriptedGateway::new(), CaptureConfig::default()).await;
    h.order(1, dec!(100.00), dec!(40.00)).await;
    h.credit_payment(1, 1, dec!(60.00)).await;
    h.ebt_payment(2, 1, dec!(40.00)).await;

    // An earlier capture recorded payment 1 and stopped before finishing.
    let mut settled = h.stored_payment(1).await;
    settled.mark_succeeded(chrono::Utc::now()).unwrap();
    PaymentStore::update(&h.ledger, settled).await.unwrap();

    let order = h.reconciler.capture(1).await.unwrap();

    assert_eq!(order.status, OrderStatus::Succeeded);
    assert_eq!(h.gateway.calls(), vec![2]);
}

#[tokio::test]
async fn test_previously_failed_payment_fails_resumed_capture() {
    let h = Harness::new(ScriptedGateway::new(), CaptureConfig::default()).await;
    h.order(1, dec!(100.00), dec!(0.00)).await;
    h.credit_payment(1, 1, dec!(60.00)).await;
    h.credit_payment(2, 1, dec!(40.00)).await;

    let mut settled = h.stored_payment(1).await;
    settled.mark_failed("card_declined: stolen card").unwrap();
    PaymentStore::update(&h.ledger, settled).await.unwrap();

    let order = h.reconciler.capture(1).await.unwrap();

    assert_eq!(order.status, OrderStatus::Failed);
    assert_eq!(h.gateway.calls(), vec![2]);
}

#[tokio::test]
async fn test_failed_outcome_write_does_not_block_other_payments() {
    let ledger = InMemoryLedger::new();
    let payments = Box::new(FailingPaymentWrites {
        inner: ledger.clone(),
        failing: 2,
    });
    let h = Harness::with_payment_store(
        ledger,
        payments,
        ScriptedGateway::new(),
        CaptureConfig::default().with_max_concurrency(1),
    )
    .await;
    h.order(1, dec!(30.00), dec!(0.00)).await;
    h.credit_payment(1, 1, dec!(10.00)).await;
    h.credit_payment(2, 1, dec!(10.00)).await;
    h.credit_payment(3, 1, dec!(10.00)).await;

    let result = h.reconciler.capture(1).await;

    assert!(matches!(
        result,
        Err(CaptureError::Ledger(LedgerError::Internal(_)))
    ));
    assert_eq!(h.gateway.calls(), vec![1, 2, 3]);
    assert_eq!(h.stored_payment(1).await.status, PaymentStatus::Succeeded);
    assert_eq!(
        h.stored_payment(2).await.status,
        PaymentStatus::RequiresConfirmation
    );
    assert_eq!(h.stored_payment(3).await.status, PaymentStatus::Succeeded);
    assert_eq!(h.stored_order(1).await.status, OrderStatus::Draft);
}

#[tokio::test]
async fn test_success_date_set_iff_succeeded() {
    let gateway = ScriptedGateway::with([(3, Script::Decline("card_declined", "limit"))]);
    let h = Harness::new(gateway, CaptureConfig::default()).await;
    h.order(1, dec!(5.00), dec!(0.00)).await;
    h.credit_payment(1, 1, dec!(5.00)).await;
    h.order(2, dec!(5.00), dec!(5.00)).await;
    h.credit_payment(2, 2, dec!(2.50)).await;
    h.ebt_payment(3, 2, dec!(2.50)).await;

    for id in [1, 2] {
        let order = h.reconciler.capture(id).await.unwrap();
        let payments = h.ledger.for_order(id).await.unwrap();
        let all_succeeded = payments
            .iter()
            .all(|payment| payment.status == PaymentStatus::Succeeded);
        assert_eq!(order.status == OrderStatus::Succeeded, all_succeeded);
        assert_eq!(order.success_date.is_some(), all_succeeded);
    }
}

/// Splits `total` cents into `parts` random non-negative amounts.
fn split(rng: &mut StdRng, total_cents: i64, parts: usize) -> Vec<Decimal> {
    let mut cuts: Vec<i64> = (1..parts).map(|_| rng.gen_range(0..=total_cents)).collect();
    cuts.push(0);
    cuts.push(total_cents);
    cuts.sort_unstable();
    cuts.windows(2)
        .map(|w| Decimal::new(w[1] - w[0], 2))
        .collect()
}

#[test]
fn test_preflight_is_deterministic_over_random_payment_sets() {
    let mut rng = StdRng::seed_from_u64(7);
    let credit = credit_card();
    let ebt = ebt_card();

    for _ in 0..200 {
        let total_cents = rng.gen_range(0..100_000);
        let ebt_cents = rng.gen_range(0..=total_cents);
        let order = Order::new(
            1,
            money(Decimal::new(total_cents, 2)),
            money(Decimal::new(ebt_cents, 2)),
        )
        .unwrap();

        // Sometimes drift the sum by a cent to exercise the mismatch path.
        let drift = if rng.gen_bool(0.2) { 1 } else { 0 };
        let parts = rng.gen_range(1..6);
        let amounts = split(&mut rng, total_cents + drift, parts);
        let payments: Vec<Payment> = amounts
            .into_iter()
            .enumerate()
            .map(|(i, amount)| {
                let card = if rng.gen_bool(0.5) { &ebt } else { &credit };
                Payment::new(i as u64 + 1, 1, money(amount), "random", card)
            })
            .collect();

        let first = preflight(&order, &payments);
        let second = preflight(&order, &payments);
        assert_eq!(first.is_ok(), second.is_ok());
        assert_eq!(
            first.as_ref().err().map(ToString::to_string),
            second.as_ref().err().map(ToString::to_string)
        );

        let ebt_sum: Decimal = payments
            .iter()
            .filter(|payment| payment.is_ebt())
            .map(|payment| payment.amount.value())
            .sum();
        let expect_ok = drift == 0 && ebt_sum <= order.ebt_total.value();
        assert_eq!(first.is_ok(), expect_ok);
    }
}
