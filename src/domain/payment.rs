use super::instrument::{Instrument, InstrumentKind, InstrumentRef};
use super::{Money, OrderId, PaymentId};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    RequiresConfirmation,
    Succeeded,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::RequiresConfirmation)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PaymentStatus::RequiresConfirmation => "requires_confirmation",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
        })
    }
}

/// A payment applied to an order.
///
/// The instrument is held as an [`InstrumentRef`], so the stored
/// `payment_card` tag and `payment_method_id` are always written as a pair.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Payment {
    pub id: PaymentId,
    pub order: OrderId,
    pub amount: Money,
    pub description: String,
    pub payment_method: InstrumentRef,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default)]
    pub success_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_processing_error: Option<String>,
}

impl Payment {
    /// Builds a new payment awaiting confirmation. The stored reference is
    /// taken from the resolved instrument, never supplied separately.
    pub fn new(
        id: PaymentId,
        order: OrderId,
        amount: Money,
        description: impl Into<String>,
        instrument: &Instrument,
    ) -> Self {
        Self {
            id,
            order,
            amount,
            description: description.into(),
            payment_method: instrument.reference(),
            status: PaymentStatus::RequiresConfirmation,
            success_date: None,
            last_processing_error: None,
        }
    }

    pub fn kind(&self) -> InstrumentKind {
        self.payment_method.kind()
    }

    pub fn is_ebt(&self) -> bool {
        self.kind() == InstrumentKind::EbtCard
    }

    pub fn mark_succeeded(&mut self, now: DateTime<Utc>) -> Result<(), LedgerError> {
        self.ensure_pending()?;
        self.status = PaymentStatus::Succeeded;
        self.success_date = Some(now);
        Ok(())
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), LedgerError> {
        self.ensure_pending()?;
        self.status = PaymentStatus::Failed;
        self.last_processing_error = Some(reason.into());
        Ok(())
    }

    /// Checks that the outcome fields agree with the status: `success_date`
    /// only on a succeeded payment, `last_processing_error` only on a failed
    /// one. Stores call this before each write.
    pub fn validate(&self) -> Result<(), LedgerError> {
        let consistent = match self.status {
            PaymentStatus::RequiresConfirmation => {
                self.success_date.is_none() && self.last_processing_error.is_none()
            }
            PaymentStatus::Succeeded => {
                self.success_date.is_some() && self.last_processing_error.is_none()
            }
            PaymentStatus::Failed => {
                self.success_date.is_none() && self.last_processing_error.is_some()
            }
        };
        if !consistent {
            return Err(LedgerError::Validation(format!(
                "Payment {} is {} but its success_date or last_processing_error disagrees",
                self.id, self.status
            )));
        }
        Ok(())
    }

    /// Checks that replacing `stored` with `self` is a legal transition. A
    /// terminal payment is never rewritten, and a payment stays on the order
    /// and instrument it was created with.
    pub fn validate_update(&self, stored: &Payment) -> Result<(), LedgerError> {
        if stored.status.is_terminal() && self != stored {
            return Err(LedgerError::Finalized {
                entity: "Payment",
                id: stored.id,
                status: stored.status.to_string(),
            });
        }
        if self.order != stored.order || self.payment_method != stored.payment_method {
            return Err(LedgerError::Validation(format!(
                "Payment {} cannot be moved to another order or instrument",
                self.id
            )));
        }
        Ok(())
    }

    fn ensure_pending(&self) -> Result<(), LedgerError> {
        if self.status.is_terminal() {
            return Err(LedgerError::Validation(format!(
                "Payment {} is already {}",
                self.id, self.status
            )));
        }
        Ok(())
    }
}
