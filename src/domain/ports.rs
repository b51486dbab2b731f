use super::instrument::{CreditCard, EbtCard, Instrument};
use super::order::Order;
use super::payment::Payment;
use super::{CardId, OrderId, PaymentId};
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get(&self, id: OrderId) -> Result<Option<Order>>;
    async fn create(&self, order: Order) -> Result<()>;
    /// Replaces the stored order in a single write.
    async fn update(&self, order: Order) -> Result<()>;
    /// Deletes the order together with every payment that references it.
    async fn delete(&self, id: OrderId) -> Result<()>;
    async fn all(&self) -> Result<Vec<Order>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn get(&self, id: PaymentId) -> Result<Option<Payment>>;
    async fn create(&self, payment: Payment) -> Result<()>;
    async fn update(&self, payment: Payment) -> Result<()>;
    async fn delete(&self, id: PaymentId) -> Result<()>;
    async fn for_order(&self, order_id: OrderId) -> Result<Vec<Payment>>;
}

#[async_trait]
pub trait InstrumentStore: Send + Sync {
    async fn get_credit_card(&self, id: CardId) -> Result<Option<CreditCard>>;
    async fn get_ebt_card(&self, id: CardId) -> Result<Option<EbtCard>>;
    async fn create_credit_card(&self, card: CreditCard) -> Result<()>;
    async fn create_ebt_card(&self, card: EbtCard) -> Result<()>;
    /// Fails with `InstrumentInUse` while a payment still references the card.
    async fn delete_credit_card(&self, id: CardId) -> Result<()>;
    async fn delete_ebt_card(&self, id: CardId) -> Result<()>;
    async fn credit_cards(&self) -> Result<Vec<CreditCard>>;
    async fn ebt_cards(&self) -> Result<Vec<EbtCard>>;
}

/// A structured refusal from the payment processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decline {
    pub code: String,
    pub message: String,
}

impl Decline {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Decline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// The external processor that moves money for a single payment.
///
/// A decline is an expected outcome, not a fault, so it is the `Err` side of
/// the result rather than a `LedgerError`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(
        &self,
        payment: &Payment,
        instrument: &Instrument,
    ) -> std::result::Result<(), Decline>;
}

pub type OrderStoreBox = Box<dyn OrderStore>;
pub type PaymentStoreBox = Box<dyn PaymentStore>;
pub type InstrumentStoreBox = Box<dyn InstrumentStore>;
pub type PaymentGatewayBox = Box<dyn PaymentGateway>;
