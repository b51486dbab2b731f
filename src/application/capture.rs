use crate::application::resolver::PaymentMethodResolver;
use crate::config::CaptureConfig;
use crate::domain::instrument::Instrument;
use crate::domain::order::Order;
use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::ports::{OrderStoreBox, PaymentGatewayBox, PaymentStoreBox};
use crate::domain::{Money, OrderId, PaymentId};
use crate::error::{CaptureError, LedgerError};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, info, instrument, warn};

/// Checks a payment set against its order before anything is charged.
///
/// The amount check runs first; the EBT eligibility check only runs once the
/// amounts reconcile. Pure, so repeated calls on the same input agree.
pub fn preflight(order: &Order, payments: &[Payment]) -> Result<(), CaptureError> {
    let payments_total = Money::try_sum(payments.iter().map(|payment| payment.amount))?;
    if payments_total != order.order_total {
        return Err(CaptureError::AmountMismatch {
            order_id: order.id,
            payments_total,
            order_total: order.order_total,
        });
    }

    let ebt_payments_total = Money::try_sum(
        payments
            .iter()
            .filter(|payment| payment.is_ebt())
            .map(|payment| payment.amount),
    )?;
    if ebt_payments_total > order.ebt_total {
        return Err(CaptureError::EligibilityExceeded {
            order_id: order.id,
            ebt_payments_total,
            ebt_total: order.ebt_total,
        });
    }

    Ok(())
}

/// Marks an order as being captured for as long as it is alive.
struct CaptureGuard<'a> {
    in_flight: &'a Mutex<HashSet<OrderId>>,
    order_id: OrderId,
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.order_id);
    }
}

/// Drives an order's payments through the gateway and settles the order.
///
/// A capture either aborts before the first gateway call (not found, totals
/// don't reconcile, order already settled) leaving every record untouched, or
/// it submits each pending payment, records each outcome with its own write,
/// and finishes with one write that moves the order to `succeeded` or
/// `failed`.
pub struct CaptureReconciler {
    orders: OrderStoreBox,
    payments: PaymentStoreBox,
    resolver: PaymentMethodResolver,
    gateway: PaymentGatewayBox,
    config: CaptureConfig,
    in_flight: Mutex<HashSet<OrderId>>,
}

impl CaptureReconciler {
    pub fn new(
        orders: OrderStoreBox,
        payments: PaymentStoreBox,
        resolver: PaymentMethodResolver,
        gateway: PaymentGatewayBox,
        config: CaptureConfig,
    ) -> Self {
        Self {
            orders,
            payments,
            resolver,
            gateway,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    fn begin(&self, order_id: OrderId) -> Result<CaptureGuard<'_>, CaptureError> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(order_id) {
            return Err(CaptureError::CaptureInProgress(order_id));
        }
        Ok(CaptureGuard {
            in_flight: &self.in_flight,
            order_id,
        })
    }

    /// Captures the order with id `order_id` and returns it in its final
    /// state.
    ///
    /// Gateway declines and timeouts are not errors here: they are recorded on
    /// the payment and make the order `failed`.
    ///
    /// Payments that are already settled (left behind by an interrupted
    /// capture) are not submitted again; their recorded outcome counts.
    #[instrument(skip(self))]
    pub async fn capture(&self, order_id: OrderId) -> Result<Order, CaptureError> {
        let _guard = self.begin(order_id)?;

        let mut order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(CaptureError::OrderNotFound(order_id))?;
        if order.status.is_terminal() {
            return Err(CaptureError::AlreadyFinalized {
                order_id,
                status: order.status,
            });
        }
        let payments = self.payments.for_order(order_id).await?;
        debug!(payments = payments.len(), "loaded order");

        if let Err(e) = preflight(&order, &payments) {
            warn!(error = %e, "capture rejected");
            return Err(e);
        }

        // Resolve everything before charging anything, so a dangling
        // reference aborts with nothing submitted.
        let mut settled = Vec::new();
        let mut pending = Vec::new();
        for payment in payments {
            if payment.status.is_terminal() {
                debug!(payment_id = payment.id, status = %payment.status, "already settled");
                settled.push(payment);
            } else {
                let instrument = self.resolver.resolve(payment.payment_method).await?;
                pending.push((payment, instrument));
            }
        }

        let processed: Vec<Result<Payment, LedgerError>> = stream::iter(pending)
            .map(|(payment, instrument)| self.process_payment(payment, instrument))
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut write_error = None;
        for result in processed {
            match result {
                Ok(payment) => settled.push(payment),
                Err(e) => {
                    write_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = write_error {
            error!(error = %e, "payment outcome not recorded, order left in draft");
            return Err(e.into());
        }

        let failed: Vec<PaymentId> = settled
            .iter()
            .filter(|payment| payment.status != PaymentStatus::Succeeded)
            .map(|payment| payment.id)
            .collect();

        order.finalize(failed.is_empty(), Utc::now());
        self.orders.update(order.clone()).await?;

        if failed.is_empty() {
            info!(status = %order.status, "order captured");
        } else {
            info!(status = %order.status, failed_payments = ?failed, "order captured with failures");
        }
        Ok(order)
    }

    /// Submits one payment and persists its outcome. Only a failed write is an
    /// error; declines and timeouts are recorded on the payment.
    async fn process_payment(
        &self,
        mut payment: Payment,
        instrument: Instrument,
    ) -> Result<Payment, LedgerError> {
        let timeout = self.config.gateway_timeout;
        match tokio::time::timeout(timeout, self.gateway.charge(&payment, &instrument)).await {
            Ok(Ok(())) => {
                payment.mark_succeeded(Utc::now())?;
                debug!(payment_id = payment.id, "payment succeeded");
            }
            Ok(Err(decline)) => {
                warn!(payment_id = payment.id, %decline, "payment declined");
                payment.mark_failed(decline.to_string())?;
            }
            Err(_) => {
                warn!(payment_id = payment.id, ?timeout, "gateway timed out");
                payment.mark_failed(format!(
                    "gateway_timeout: no response from payment processor within {} ms",
                    timeout.as_millis()
                ))?;
            }
        }

        if let Err(e) = self.payments.update(payment.clone()).await {
            error!(
                payment_id = payment.id,
                status = %payment.status,
                error = %e,
                "failed to record payment outcome"
            );
            return Err(e);
        }
        Ok(payment)
    }
}
