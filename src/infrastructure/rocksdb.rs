use crate::domain::instrument::{CreditCard, EbtCard, InstrumentKind, InstrumentRef};
use crate::domain::order::Order;
use crate::domain::payment::Payment;
use crate::domain::ports::{InstrumentStore, OrderStore, PaymentStore};
use crate::domain::{CardId, OrderId, PaymentId};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for storing orders.
pub const CF_ORDERS: &str = "orders";
/// Column Family for storing payments.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for storing credit cards.
pub const CF_CREDIT_CARDS: &str = "credit_cards";
/// Column Family for storing EBT cards.
pub const CF_EBT_CARDS: &str = "ebt_cards";

/// A persistent ledger implementation using RocksDB.
///
/// Each table lives in its own Column Family, keyed by the big-endian record
/// id with a JSON value. Writes that must check-then-act (existence checks,
/// cascades) are serialized through `write_lock`; the cascade from an order to
/// its payments is committed as one `WriteBatch`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBLedger {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBLedger {
    /// Opens or creates a RocksDB instance at the specified path, creating any
    /// missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_ORDERS, CF_PAYMENTS, CF_CREDIT_CARDS, CF_EBT_CARDS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            LedgerError::Internal(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn read<T: DeserializeOwned>(&self, cf_name: &str, id: u64) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn exists(&self, cf_name: &str, id: u64) -> Result<bool> {
        let cf = self.cf(cf_name)?;
        Ok(self.db.get_pinned_cf(cf, id.to_be_bytes())?.is_some())
    }

    fn write<T: Serialize>(&self, cf_name: &str, id: u64, value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(cf, id.to_be_bytes(), bytes)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }

    fn remove(&self, cf_name: &str, entity: &'static str, id: u64) -> Result<()> {
        if !self.exists(cf_name, id)? {
            return Err(LedgerError::not_found(entity, id));
        }
        let cf = self.cf(cf_name)?;
        self.db.delete_cf(cf, id.to_be_bytes())?;
        Ok(())
    }

    fn ensure_instrument(&self, reference: InstrumentRef) -> Result<()> {
        let cf_name = match reference {
            InstrumentRef::CreditCard(_) => CF_CREDIT_CARDS,
            InstrumentRef::EbtCard(_) => CF_EBT_CARDS,
        };
        if !self.exists(cf_name, reference.id())? {
            return Err(LedgerError::not_found(
                reference.kind().entity(),
                reference.id(),
            ));
        }
        Ok(())
    }

    fn ensure_unreferenced(&self, reference: InstrumentRef) -> Result<()> {
        let payments: Vec<Payment> = self.scan(CF_PAYMENTS)?;
        if payments
            .iter()
            .any(|payment| payment.payment_method == reference)
        {
            return Err(LedgerError::InstrumentInUse {
                kind: reference.kind(),
                id: reference.id(),
            });
        }
        Ok(())
    }

    fn create_new<T: Serialize>(
        &self,
        cf_name: &str,
        entity: &'static str,
        id: u64,
        value: &T,
    ) -> Result<()> {
        if self.exists(cf_name, id)? {
            return Err(LedgerError::AlreadyExists { entity, id });
        }
        self.write(cf_name, id, value)
    }
}

#[async_trait]
impl OrderStore for RocksDBLedger {
    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        self.read(CF_ORDERS, id)
    }

    async fn create(&self, order: Order) -> Result<()> {
        order.validate()?;
        let _guard = self.write_lock.lock().await;
        self.create_new(CF_ORDERS, "Order", order.id, &order)
    }

    async fn update(&self, order: Order) -> Result<()> {
        order.validate()?;
        let _guard = self.write_lock.lock().await;
        let stored: Order = self
            .read(CF_ORDERS, order.id)?
            .ok_or_else(|| LedgerError::not_found("Order", order.id))?;
        order.validate_update(&stored)?;
        self.write(CF_ORDERS, order.id, &order)
    }

    async fn delete(&self, id: OrderId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if !self.exists(CF_ORDERS, id)? {
            return Err(LedgerError::not_found("Order", id));
        }

        let orders = self.cf(CF_ORDERS)?;
        let payments_cf = self.cf(CF_PAYMENTS)?;
        let mut batch = WriteBatch::default();
        batch.delete_cf(orders, id.to_be_bytes());
        let payments: Vec<Payment> = self.scan(CF_PAYMENTS)?;
        for payment in payments.iter().filter(|payment| payment.order == id) {
            batch.delete_cf(payments_cf, payment.id.to_be_bytes());
        }
        self.db.write(batch)?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Order>> {
        self.scan(CF_ORDERS)
    }
}

#[async_trait]
impl PaymentStore for RocksDBLedger {
    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        self.read(CF_PAYMENTS, id)
    }

    async fn create(&self, payment: Payment) -> Result<()> {
        payment.validate()?;
        let _guard = self.write_lock.lock().await;
        if !self.exists(CF_ORDERS, payment.order)? {
            return Err(LedgerError::not_found("Order", payment.order));
        }
        self.ensure_instrument(payment.payment_method)?;
        self.create_new(CF_PAYMENTS, "Payment", payment.id, &payment)
    }

    async fn update(&self, payment: Payment) -> Result<()> {
        payment.validate()?;
        let _guard = self.write_lock.lock().await;
        let stored: Payment = self
            .read(CF_PAYMENTS, payment.id)?
            .ok_or_else(|| LedgerError::not_found("Payment", payment.id))?;
        payment.validate_update(&stored)?;
        self.ensure_instrument(payment.payment_method)?;
        self.write(CF_PAYMENTS, payment.id, &payment)
    }

    async fn delete(&self, id: PaymentId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.remove(CF_PAYMENTS, "Payment", id)
    }

    async fn for_order(&self, order_id: OrderId) -> Result<Vec<Payment>> {
        let payments: Vec<Payment> = self.scan(CF_PAYMENTS)?;
        Ok(payments
            .into_iter()
            .filter(|payment| payment.order == order_id)
            .collect())
    }
}

#[async_trait]
impl InstrumentStore for RocksDBLedger {
    async fn get_credit_card(&self, id: CardId) -> Result<Option<CreditCard>> {
        self.read(CF_CREDIT_CARDS, id)
    }

    async fn get_ebt_card(&self, id: CardId) -> Result<Option<EbtCard>> {
        self.read(CF_EBT_CARDS, id)
    }

    async fn create_credit_card(&self, card: CreditCard) -> Result<()> {
        card.validate()?;
        let _guard = self.write_lock.lock().await;
        self.create_new(
            CF_CREDIT_CARDS,
            InstrumentKind::CreditCard.entity(),
            card.id,
            &card,
        )
    }

    async fn create_ebt_card(&self, card: EbtCard) -> Result<()> {
        card.validate()?;
        let _guard = self.write_lock.lock().await;
        self.create_new(CF_EBT_CARDS, InstrumentKind::EbtCard.entity(), card.id, &card)
    }

    async fn delete_credit_card(&self, id: CardId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.ensure_unreferenced(InstrumentRef::CreditCard(id))?;
        self.remove(CF_CREDIT_CARDS, InstrumentKind::CreditCard.entity(), id)
    }

    async fn delete_ebt_card(&self, id: CardId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.ensure_unreferenced(InstrumentRef::EbtCard(id))?;
        self.remove(CF_EBT_CARDS, InstrumentKind::EbtCard.entity(), id)
    }

    async fn credit_cards(&self) -> Result<Vec<CreditCard>> {
        self.scan(CF_CREDIT_CARDS)
    }

    async fn ebt_cards(&self) -> Result<Vec<EbtCard>> {
        self.scan(CF_EBT_CARDS)
    }
}
