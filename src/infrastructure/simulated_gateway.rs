use crate::domain::instrument::Instrument;
use crate::domain::payment::Payment;
use crate::domain::ports::{Decline, PaymentGateway};
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use std::time::Duration;

/// An offline stand-in for a payment processor.
///
/// Declines what a real processor would reject up front: malformed or
/// checksum-failing card numbers and expired credit cards. Everything else is
/// approved after `latency`.
#[derive(Debug, Clone, Default)]
pub struct SimulatedGateway {
    latency: Duration,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn check(instrument: &Instrument, today: (u16, u8)) -> Result<(), Decline> {
        let number = instrument.number();
        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Decline::new(
                "invalid_number",
                "card number must contain only digits",
            ));
        }
        if !luhn_valid(number) {
            return Err(Decline::new(
                "invalid_number",
                format!("card ending in {} failed the checksum", instrument.last_4()),
            ));
        }
        if let Instrument::CreditCard(card) = instrument {
            let (year, month) = today;
            if (card.exp_year, card.exp_month) < (year, month) {
                return Err(Decline::new(
                    "expired_card",
                    format!(
                        "card ending in {} expired {:02}/{:02}",
                        card.last_4, card.exp_month, card.exp_year
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Luhn mod-10 checksum over an all-digit string.
fn luhn_valid(number: &str) -> bool {
    let sum: u32 = number
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                digit
            }
        })
        .sum();
    sum % 10 == 0
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, _payment: &Payment, instrument: &Instrument) -> Result<(), Decline> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let now = Utc::now();
        // Card expiry years are stored with two digits.
        let today = ((now.year() % 100) as u16, now.month() as u8);
        Self::check(instrument, today)
    }
}
