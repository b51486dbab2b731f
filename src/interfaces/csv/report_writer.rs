use crate::domain::instrument::InstrumentKind;
use crate::domain::order::{Order, OrderStatus};
use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::{Money, OrderId, PaymentId};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct CaptureRow<'a> {
    order: OrderId,
    order_status: OrderStatus,
    payment: PaymentId,
    payment_card: InstrumentKind,
    amount: Money,
    status: PaymentStatus,
    last_processing_error: Option<&'a str>,
}

/// Writes one CSV row per payment of each captured order.
pub struct CaptureReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CaptureReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_capture(&mut self, order: &Order, payments: &[Payment]) -> Result<()> {
        for payment in payments {
            self.writer.serialize(CaptureRow {
                order: order.id,
                order_status: order.status,
                payment: payment.id,
                payment_card: payment.kind(),
                amount: payment.amount,
                status: payment.status,
                last_processing_error: payment.last_processing_error.as_deref(),
            })?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
