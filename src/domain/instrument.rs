use super::CardId;
use crate::error::LedgerError;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Card brands accepted for either kind of instrument.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CardBrand {
    Amex,
    Discover,
    Mastercard,
    Visa,
}

/// The stored discriminator of a payment's instrument (`payment_card`).
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    CreditCard,
    EbtCard,
}

impl InstrumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentKind::CreditCard => "creditcard",
            InstrumentKind::EbtCard => "ebtcard",
        }
    }

    /// Entity name used in not-found and in-use errors.
    pub fn entity(&self) -> &'static str {
        match self {
            InstrumentKind::CreditCard => "CreditCard",
            InstrumentKind::EbtCard => "EBTCard",
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored reference to an instrument: the kind tag and the id travel
/// together, so one can never be persisted without the other.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(tag = "payment_card", content = "payment_method_id", rename_all = "lowercase")]
pub enum InstrumentRef {
    CreditCard(CardId),
    EbtCard(CardId),
}

impl InstrumentRef {
    pub fn new(kind: InstrumentKind, id: CardId) -> Self {
        match kind {
            InstrumentKind::CreditCard => InstrumentRef::CreditCard(id),
            InstrumentKind::EbtCard => InstrumentRef::EbtCard(id),
        }
    }

    pub fn kind(&self) -> InstrumentKind {
        match self {
            InstrumentRef::CreditCard(_) => InstrumentKind::CreditCard,
            InstrumentRef::EbtCard(_) => InstrumentKind::EbtCard,
        }
    }

    pub fn id(&self) -> CardId {
        match self {
            InstrumentRef::CreditCard(id) | InstrumentRef::EbtCard(id) => *id,
        }
    }
}

fn last_four(number: &str) -> Result<String, LedgerError> {
    if number.len() < 4 || !number.is_ascii() {
        return Err(LedgerError::Validation(
            "Card number must have at least 4 characters".to_string(),
        ));
    }
    Ok(number[number.len() - 4..].to_string())
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct CreditCard {
    pub id: CardId,
    pub number: String,
    pub last_4: String,
    pub brand: CardBrand,
    pub exp_month: u8,
    /// Two-digit year, e.g. 26 for 2026.
    pub exp_year: u16,
}

impl CreditCard {
    pub const MAX_NUMBER_LEN: usize = 17;

    pub fn new(
        id: CardId,
        number: impl Into<String>,
        brand: CardBrand,
        exp_month: u8,
        exp_year: u16,
    ) -> Result<Self, LedgerError> {
        let number = number.into();
        if number.len() > Self::MAX_NUMBER_LEN {
            return Err(LedgerError::Validation(format!(
                "Credit card number must be at most {} characters",
                Self::MAX_NUMBER_LEN
            )));
        }
        if !(1..=12).contains(&exp_month) {
            return Err(LedgerError::Validation(
                "Expiry month of credit/debit/prepaid cards must be in the range 1 <= month <= 12"
                    .to_string(),
            ));
        }
        Ok(Self {
            id,
            last_4: last_four(&number)?,
            number,
            brand,
            exp_month,
            exp_year,
        })
    }

    /// Re-checks the constructor rules on a record that arrived through
    /// deserialization.
    pub fn validate(&self) -> Result<(), LedgerError> {
        let checked = Self::new(
            self.id,
            self.number.clone(),
            self.brand,
            self.exp_month,
            self.exp_year,
        )?;
        if checked.last_4 != self.last_4 {
            return Err(LedgerError::Validation(
                "last_4 does not match the card number".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct EbtCard {
    pub id: CardId,
    pub number: String,
    pub last_4: String,
    pub brand: CardBrand,
}

impl EbtCard {
    pub fn new(id: CardId, number: impl Into<String>, brand: CardBrand) -> Result<Self, LedgerError> {
        let number = number.into();
        if !(16..=19).contains(&number.chars().count()) {
            return Err(LedgerError::Validation(
                "Number length must be between 16 and 19 characters.".to_string(),
            ));
        }
        Ok(Self {
            id,
            last_4: last_four(&number)?,
            number,
            brand,
        })
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        let checked = Self::new(self.id, self.number.clone(), self.brand)?;
        if checked.last_4 != self.last_4 {
            return Err(LedgerError::Validation(
                "last_4 does not match the card number".to_string(),
            ));
        }
        Ok(())
    }
}

/// A resolved instrument. Every place that needs the concrete card matches on
/// this exhaustively; there is no "unknown kind" case.
///
/// Serializes as the outward view of the card: a credit card shows its
/// `last_4` and expiry but never the full number.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Instrument {
    CreditCard(CreditCard),
    EbtCard(EbtCard),
}

#[derive(Serialize)]
struct CreditCardView<'a> {
    id: CardId,
    last_4: &'a str,
    brand: CardBrand,
    exp_month: u8,
    exp_year: u16,
}

#[derive(Serialize)]
#[serde(tag = "payment_card", rename_all = "lowercase")]
enum InstrumentView<'a> {
    CreditCard(CreditCardView<'a>),
    EbtCard(&'a EbtCard),
}

impl Serialize for Instrument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let view = match self {
            Instrument::CreditCard(card) => InstrumentView::CreditCard(CreditCardView {
                id: card.id,
                last_4: &card.last_4,
                brand: card.brand,
                exp_month: card.exp_month,
                exp_year: card.exp_year,
            }),
            Instrument::EbtCard(card) => InstrumentView::EbtCard(card),
        };
        view.serialize(serializer)
    }
}

impl Instrument {
    pub fn kind(&self) -> InstrumentKind {
        match self {
            Instrument::CreditCard(_) => InstrumentKind::CreditCard,
            Instrument::EbtCard(_) => InstrumentKind::EbtCard,
        }
    }

    pub fn reference(&self) -> InstrumentRef {
        match self {
            Instrument::CreditCard(card) => InstrumentRef::CreditCard(card.id),
            Instrument::EbtCard(card) => InstrumentRef::EbtCard(card.id),
        }
    }

    pub fn number(&self) -> &str {
        match self {
            Instrument::CreditCard(card) => &card.number,
            Instrument::EbtCard(card) => &card.number,
        }
    }

    pub fn last_4(&self) -> &str {
        match self {
            Instrument::CreditCard(card) => &card.last_4,
            Instrument::EbtCard(card) => &card.last_4,
        }
    }
}

impl From<CreditCard> for Instrument {
    fn from(card: CreditCard) -> Self {
        Instrument::CreditCard(card)
    }
}

impl From<EbtCard> for Instrument {
    fn from(card: EbtCard) -> Self {
        Instrument::EbtCard(card)
    }
}
