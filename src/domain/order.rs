use super::{Money, OrderId};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Draft,
    Failed,
    Succeeded,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Draft)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Failed => "failed",
            OrderStatus::Succeeded => "succeeded",
        })
    }
}

/// An order and the totals its payments are reconciled against.
///
/// `ebt_total` is the part of `order_total` that may be paid with EBT tender;
/// it is not required to be covered by EBT.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Order {
    pub id: OrderId,
    pub order_total: Money,
    pub ebt_total: Money,
    #[serde(default)]
    pub status: OrderStatus,
    /// Set exactly when the order transitions to `succeeded`.
    #[serde(default)]
    pub success_date: Option<DateTime<Utc>>,
}

impl Order {
    /// Creates a draft order, rejecting an `ebt_total` above `order_total`.
    pub fn new(id: OrderId, order_total: Money, ebt_total: Money) -> Result<Self, LedgerError> {
        let order = Self {
            id,
            order_total,
            ebt_total,
            status: OrderStatus::Draft,
            success_date: None,
        };
        order.validate()?;
        Ok(order)
    }

    /// Checks the invariants every stored order must hold. Stores call this
    /// before each write.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.ebt_total > self.order_total {
            return Err(LedgerError::EbtTotalExceedsOrderTotal {
                ebt_total: self.ebt_total,
                order_total: self.order_total,
            });
        }
        match (self.status, self.success_date) {
            (OrderStatus::Succeeded, None) => Err(LedgerError::Validation(format!(
                "Order {} is succeeded but has no success_date",
                self.id
            ))),
            (OrderStatus::Draft | OrderStatus::Failed, Some(_)) => {
                Err(LedgerError::Validation(format!(
                    "Order {} is {} but has a success_date",
                    self.id, self.status
                )))
            }
            _ => Ok(()),
        }
    }

    /// Checks that replacing `stored` with `self` is a legal transition. A
    /// terminal order is never rewritten.
    pub fn validate_update(&self, stored: &Order) -> Result<(), LedgerError> {
        if stored.status.is_terminal() && self != stored {
            return Err(LedgerError::Finalized {
                entity: "Order",
                id: stored.id,
                status: stored.status.to_string(),
            });
        }
        Ok(())
    }

    /// Moves a draft order to its terminal state. Status and `success_date`
    /// change together; the caller persists the result in a single write.
    pub fn finalize(&mut self, all_payments_succeeded: bool, now: DateTime<Utc>) {
        if all_payments_succeeded {
            self.status = OrderStatus::Succeeded;
            self.success_date = Some(now);
        } else {
            self.status = OrderStatus::Failed;
            self.success_date = None;
        }
    }
}
