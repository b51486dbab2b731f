use crate::domain::instrument::{CreditCard, EbtCard, InstrumentKind, InstrumentRef};
use crate::domain::order::Order;
use crate::domain::payment::Payment;
use crate::domain::ports::{InstrumentStore, OrderStore, PaymentStore};
use crate::domain::{CardId, OrderId, PaymentId};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    orders: BTreeMap<OrderId, Order>,
    payments: BTreeMap<PaymentId, Payment>,
    credit_cards: BTreeMap<CardId, CreditCard>,
    ebt_cards: BTreeMap<CardId, EbtCard>,
}

impl Tables {
    fn ensure_instrument(&self, reference: InstrumentRef) -> Result<()> {
        let exists = match reference {
            InstrumentRef::CreditCard(id) => self.credit_cards.contains_key(&id),
            InstrumentRef::EbtCard(id) => self.ebt_cards.contains_key(&id),
        };
        if !exists {
            return Err(LedgerError::not_found(
                reference.kind().entity(),
                reference.id(),
            ));
        }
        Ok(())
    }

    fn ensure_unreferenced(&self, reference: InstrumentRef) -> Result<()> {
        if self
            .payments
            .values()
            .any(|payment| payment.payment_method == reference)
        {
            return Err(LedgerError::InstrumentInUse {
                kind: reference.kind(),
                id: reference.id(),
            });
        }
        Ok(())
    }
}

/// A thread-safe in-memory ledger holding orders, payments and both card
/// tables.
///
/// All four tables sit behind one `Arc<RwLock<..>>`, so every write (including
/// the cascade from an order to its payments) happens under a single lock and
/// readers never see it half-applied. `Clone` shares the same tables.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryLedger {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryLedger {
    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables.orders.get(&id).cloned())
    }

    async fn create(&self, order: Order) -> Result<()> {
        order.validate()?;
        let mut tables = self.tables.write().await;
        if tables.orders.contains_key(&order.id) {
            return Err(LedgerError::AlreadyExists {
                entity: "Order",
                id: order.id,
            });
        }
        tables.orders.insert(order.id, order);
        Ok(())
    }

    async fn update(&self, order: Order) -> Result<()> {
        order.validate()?;
        let mut tables = self.tables.write().await;
        match tables.orders.get_mut(&order.id) {
            Some(stored) => {
                order.validate_update(stored)?;
                *stored = order;
                Ok(())
            }
            None => Err(LedgerError::not_found("Order", order.id)),
        }
    }

    async fn delete(&self, id: OrderId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.orders.remove(&id).is_none() {
            return Err(LedgerError::not_found("Order", id));
        }
        tables.payments.retain(|_, payment| payment.order != id);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        Ok(tables.orders.values().cloned().collect())
    }
}

#[async_trait]
impl PaymentStore for InMemoryLedger {
    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables.payments.get(&id).cloned())
    }

    async fn create(&self, payment: Payment) -> Result<()> {
        payment.validate()?;
        let mut tables = self.tables.write().await;
        if tables.payments.contains_key(&payment.id) {
            return Err(LedgerError::AlreadyExists {
                entity: "Payment",
                id: payment.id,
            });
        }
        if !tables.orders.contains_key(&payment.order) {
            return Err(LedgerError::not_found("Order", payment.order));
        }
        tables.ensure_instrument(payment.payment_method)?;
        tables.payments.insert(payment.id, payment);
        Ok(())
    }

    async fn update(&self, payment: Payment) -> Result<()> {
        payment.validate()?;
        let mut tables = self.tables.write().await;
        let stored = tables
            .payments
            .get(&payment.id)
            .ok_or_else(|| LedgerError::not_found("Payment", payment.id))?;
        payment.validate_update(stored)?;
        tables.ensure_instrument(payment.payment_method)?;
        tables.payments.insert(payment.id, payment);
        Ok(())
    }

    async fn delete(&self, id: PaymentId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .payments
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| LedgerError::not_found("Payment", id))
    }

    async fn for_order(&self, order_id: OrderId) -> Result<Vec<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .values()
            .filter(|payment| payment.order == order_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl InstrumentStore for InMemoryLedger {
    async fn get_credit_card(&self, id: CardId) -> Result<Option<CreditCard>> {
        let tables = self.tables.read().await;
        Ok(tables.credit_cards.get(&id).cloned())
    }

    async fn get_ebt_card(&self, id: CardId) -> Result<Option<EbtCard>> {
        let tables = self.tables.read().await;
        Ok(tables.ebt_cards.get(&id).cloned())
    }

    async fn create_credit_card(&self, card: CreditCard) -> Result<()> {
        card.validate()?;
        let mut tables = self.tables.write().await;
        if tables.credit_cards.contains_key(&card.id) {
            return Err(LedgerError::AlreadyExists {
                entity: InstrumentKind::CreditCard.entity(),
                id: card.id,
            });
        }
        tables.credit_cards.insert(card.id, card);
        Ok(())
    }

    async fn create_ebt_card(&self, card: EbtCard) -> Result<()> {
        card.validate()?;
        let mut tables = self.tables.write().await;
        if tables.ebt_cards.contains_key(&card.id) {
            return Err(LedgerError::AlreadyExists {
                entity: InstrumentKind::EbtCard.entity(),
                id: card.id,
            });
        }
        tables.ebt_cards.insert(card.id, card);
        Ok(())
    }

    async fn delete_credit_card(&self, id: CardId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.ensure_unreferenced(InstrumentRef::CreditCard(id))?;
        tables
            .credit_cards
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| LedgerError::not_found(InstrumentKind::CreditCard.entity(), id))
    }

    async fn delete_ebt_card(&self, id: CardId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.ensure_unreferenced(InstrumentRef::EbtCard(id))?;
        tables
            .ebt_cards
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| LedgerError::not_found(InstrumentKind::EbtCard.entity(), id))
    }

    async fn credit_cards(&self) -> Result<Vec<CreditCard>> {
        let tables = self.tables.read().await;
        Ok(tables.credit_cards.values().cloned().collect())
    }

    async fn ebt_cards(&self) -> Result<Vec<EbtCard>> {
        let tables = self.tables.read().await;
        Ok(tables.ebt_cards.values().cloned().collect())
    }
}
