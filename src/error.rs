use crate::domain::instrument::InstrumentKind;
use crate::domain::order::OrderStatus;
use crate::domain::{Money, OrderId};
use thiserror::Error;

/// Errors raised by the ledger: record validation and storage access.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: u64 },
    #[error("{entity} with id {id} already exists")]
    AlreadyExists { entity: &'static str, id: u64 },
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("EBT total {ebt_total} cannot be greater than order total {order_total}")]
    EbtTotalExceedsOrderTotal { ebt_total: Money, order_total: Money },
    #[error("{entity} with id {id} is already {status} and cannot be changed")]
    Finalized {
        entity: &'static str,
        id: u64,
        status: String,
    },
    #[error("{kind} {id} is still referenced by a payment")]
    InstrumentInUse { kind: InstrumentKind, id: u64 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: u64) -> Self {
        Self::NotFound { entity, id }
    }
}

/// Errors returned by a capture attempt.
///
/// Gateway declines are not errors: they are recorded on the payment and
/// rolled up into the order status.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Unable to find Order with id {0}")]
    OrderNotFound(OrderId),
    #[error(
        "Payment total {payments_total} does not match order total {order_total} for Order with id {order_id}"
    )]
    AmountMismatch {
        order_id: OrderId,
        payments_total: Money,
        order_total: Money,
    },
    #[error(
        "EBT payments total {ebt_payments_total} exceeds EBT eligible total {ebt_total} for Order with id {order_id}"
    )]
    EligibilityExceeded {
        order_id: OrderId,
        ebt_payments_total: Money,
        ebt_total: Money,
    },
    #[error("Order with id {order_id} is already {status}")]
    AlreadyFinalized {
        order_id: OrderId,
        status: OrderStatus,
    },
    #[error("A capture for Order with id {0} is already in progress")]
    CaptureInProgress(OrderId),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl CaptureError {
    /// True when the caller can correct its input and run the capture again.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            CaptureError::OrderNotFound(_)
                | CaptureError::AmountMismatch { .. }
                | CaptureError::EligibilityExceeded { .. }
                | CaptureError::CaptureInProgress(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
