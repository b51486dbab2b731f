#![allow(dead_code)]

use async_trait::async_trait;
use order_capture::application::capture::CaptureReconciler;
use order_capture::application::resolver::PaymentMethodResolver;
use order_capture::config::CaptureConfig;
use order_capture::domain::instrument::{CardBrand, CreditCard, EbtCard, Instrument};
use order_capture::domain::order::Order;
use order_capture::domain::payment::Payment;
use order_capture::domain::ports::{
    Decline, InstrumentStore, OrderStore, PaymentGateway, PaymentStore, PaymentStoreBox,
};
use order_capture::domain::{Money, OrderId, PaymentId};
use order_capture::error::{LedgerError, Result};
use order_capture::infrastructure::in_memory::InMemoryLedger;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CREDIT_CARD_ID: u64 = 1;
pub const EBT_CARD_ID: u64 = 1;

pub fn money(value: Decimal) -> Money {
    Money::new(value).unwrap()
}

pub fn credit_card() -> Instrument {
    CreditCard::new(CREDIT_CARD_ID, "4111111111111111", CardBrand::Visa, 12, 30)
        .unwrap()
        .into()
}

pub fn ebt_card() -> Instrument {
    EbtCard::new(EBT_CARD_ID, "6011111111111117", CardBrand::Discover)
        .unwrap()
        .into()
}

#[derive(Debug, Clone)]
pub enum Script {
    Approve,
    Decline(&'static str, &'static str),
    Delay(Duration),
}

/// A gateway whose answer per payment id is scripted up front. Unscripted
/// payments are approved. Records every call and the peak number of calls in
/// flight at once.
#[derive(Clone, Default)]
pub struct ScriptedGateway {
    scripts: Arc<HashMap<PaymentId, Script>>,
    calls: Arc<Mutex<Vec<PaymentId>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(scripts: impl IntoIterator<Item = (PaymentId, Script)>) -> Self {
        Self {
            scripts: Arc::new(scripts.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<PaymentId> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort_unstable();
        calls
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn charge(
        &self,
        payment: &Payment,
        _instrument: &Instrument,
    ) -> std::result::Result<(), Decline> {
        self.calls.lock().unwrap().push(payment.id);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let script = self.scripts.get(&payment.id).cloned().unwrap_or(Script::Approve);
        let result = match script {
            Script::Approve => Ok(()),
            Script::Decline(code, message) => Err(Decline::new(code, message)),
            Script::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Wraps a ledger and fails `update` for one payment id.
#[derive(Clone)]
pub struct FailingPaymentWrites {
    pub inner: InMemoryLedger,
    pub failing: PaymentId,
}

#[async_trait]
impl PaymentStore for FailingPaymentWrites {
    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        PaymentStore::get(&self.inner, id).await
    }

    async fn create(&self, payment: Payment) -> Result<()> {
        PaymentStore::create(&self.inner, payment).await
    }

    async fn update(&self, payment: Payment) -> Result<()> {
        if payment.id == self.failing {
            return Err(LedgerError::Internal(Box::new(std::io::Error::other(
                "disk full",
            ))));
        }
        PaymentStore::update(&self.inner, payment).await
    }

    async fn delete(&self, id: PaymentId) -> Result<()> {
        PaymentStore::delete(&self.inner, id).await
    }

    async fn for_order(&self, order_id: OrderId) -> Result<Vec<Payment>> {
        self.inner.for_order(order_id).await
    }
}

/// An in-memory ledger with both test cards registered, plus a reconciler
/// wired to it.
pub struct Harness {
    pub ledger: InMemoryLedger,
    pub gateway: ScriptedGateway,
    pub reconciler: CaptureReconciler,
}

impl Harness {
    pub async fn new(gateway: ScriptedGateway, config: CaptureConfig) -> Self {
        let ledger = InMemoryLedger::new();
        Self::with_payment_store(ledger.clone(), Box::new(ledger), gateway, config).await
    }

    pub async fn with_payment_store(
        ledger: InMemoryLedger,
        payments: PaymentStoreBox,
        gateway: ScriptedGateway,
        config: CaptureConfig,
    ) -> Self {
        if let Instrument::CreditCard(card) = credit_card() {
            ledger.create_credit_card(card).await.unwrap();
        }
        if let Instrument::EbtCard(card) = ebt_card() {
            ledger.create_ebt_card(card).await.unwrap();
        }
        let reconciler = CaptureReconciler::new(
            Box::new(ledger.clone()),
            payments,
            PaymentMethodResolver::new(Box::new(ledger.clone())),
            Box::new(gateway.clone()),
            config,
        );
        Self {
            ledger,
            gateway,
            reconciler,
        }
    }

    pub async fn order(&self, id: OrderId, order_total: Decimal, ebt_total: Decimal) {
        OrderStore::create(
            &self.ledger,
            Order::new(id, money(order_total), money(ebt_total)).unwrap(),
        )
        .await
        .unwrap();
    }

    pub async fn credit_payment(&self, id: PaymentId, order: OrderId, amount: Decimal) {
        self.payment(id, order, amount, &credit_card()).await;
    }

    pub async fn ebt_payment(&self, id: PaymentId, order: OrderId, amount: Decimal) {
        self.payment(id, order, amount, &ebt_card()).await;
    }

    async fn payment(&self, id: PaymentId, order: OrderId, amount: Decimal, card: &Instrument) {
        PaymentStore::create(
            &self.ledger,
            Payment::new(id, order, money(amount), "test payment", card),
        )
        .await
        .unwrap();
    }

    pub async fn stored_order(&self, id: OrderId) -> Order {
        OrderStore::get(&self.ledger, id).await.unwrap().unwrap()
    }

    pub async fn stored_payment(&self, id: PaymentId) -> Payment {
        PaymentStore::get(&self.ledger, id).await.unwrap().unwrap()
    }
}
