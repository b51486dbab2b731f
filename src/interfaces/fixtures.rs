use crate::application::resolver::PaymentMethodResolver;
use crate::domain::instrument::{CardBrand, CreditCard, EbtCard, InstrumentKind};
use crate::domain::order::Order;
use crate::domain::payment::Payment;
use crate::domain::ports::{InstrumentStore, OrderStore, PaymentStore};
use crate::domain::{CardId, Money, OrderId, PaymentId};
use crate::error::Result;
use serde::Deserialize;
use std::io::Read;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct CreditCardFixture {
    pub id: CardId,
    pub number: String,
    pub brand: CardBrand,
    pub exp_month: u8,
    pub exp_year: u16,
}

#[derive(Debug, Deserialize)]
pub struct EbtCardFixture {
    pub id: CardId,
    pub number: String,
    pub brand: CardBrand,
}

#[derive(Debug, Deserialize)]
pub struct OrderFixture {
    pub id: OrderId,
    pub order_total: Money,
    pub ebt_total: Money,
}

/// A payment as a client submits it: the instrument is named by tag and id
/// and only becomes a stored reference once it resolves.
#[derive(Debug, Deserialize)]
pub struct PaymentFixture {
    pub id: PaymentId,
    pub order: OrderId,
    pub amount: Money,
    #[serde(default)]
    pub description: String,
    pub payment_card: InstrumentKind,
    pub payment_method_id: CardId,
}

/// The contents of a fixtures file: request bodies for every entity, in
/// dependency order.
#[derive(Debug, Default, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub credit_cards: Vec<CreditCardFixture>,
    #[serde(default)]
    pub ebt_cards: Vec<EbtCardFixture>,
    #[serde(default)]
    pub orders: Vec<OrderFixture>,
    #[serde(default)]
    pub payments: Vec<PaymentFixture>,
}

impl Fixtures {
    /// Parses fixtures from any JSON `Read` source.
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        Ok(serde_json::from_reader(source)?)
    }

    /// Creates every record in the ledger and returns the ids of the orders
    /// created. Stops at the first record the ledger rejects.
    pub async fn seed(
        self,
        orders: &dyn OrderStore,
        payments: &dyn PaymentStore,
        instruments: &dyn InstrumentStore,
        resolver: &PaymentMethodResolver,
    ) -> Result<Vec<OrderId>> {
        for card in self.credit_cards {
            instruments
                .create_credit_card(CreditCard::new(
                    card.id,
                    card.number,
                    card.brand,
                    card.exp_month,
                    card.exp_year,
                )?)
                .await?;
        }
        for card in self.ebt_cards {
            instruments
                .create_ebt_card(EbtCard::new(card.id, card.number, card.brand)?)
                .await?;
        }

        let mut order_ids = Vec::with_capacity(self.orders.len());
        for order in self.orders {
            orders
                .create(Order::new(order.id, order.order_total, order.ebt_total)?)
                .await?;
            order_ids.push(order.id);
        }

        for payment in self.payments {
            let instrument = resolver
                .resolve_tagged(payment.payment_card, payment.payment_method_id)
                .await?;
            payments
                .create(Payment::new(
                    payment.id,
                    payment.order,
                    payment.amount,
                    payment.description,
                    &instrument,
                ))
                .await?;
        }

        debug!(orders = order_ids.len(), "fixtures loaded");
        Ok(order_ids)
    }
}
