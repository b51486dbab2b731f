use crate::domain::instrument::{Instrument, InstrumentKind, InstrumentRef};
use crate::domain::ports::InstrumentStoreBox;
use crate::error::{LedgerError, Result};

/// Turns a stored `(payment_card, payment_method_id)` reference into the
/// concrete card it points at.
///
/// The kind tag selects the table with a plain `match`; there is no lookup by
/// type name.
pub struct PaymentMethodResolver {
    store: InstrumentStoreBox,
}

impl PaymentMethodResolver {
    pub fn new(store: InstrumentStoreBox) -> Self {
        Self { store }
    }

    /// Loads the instrument behind `reference`, or `NotFound` when the table
    /// selected by its kind has no such id.
    pub async fn resolve(&self, reference: InstrumentRef) -> Result<Instrument> {
        let instrument = match reference {
            InstrumentRef::CreditCard(id) => self
                .store
                .get_credit_card(id)
                .await?
                .map(Instrument::CreditCard),
            InstrumentRef::EbtCard(id) => self.store.get_ebt_card(id).await?.map(Instrument::EbtCard),
        };
        instrument.ok_or_else(|| LedgerError::not_found(reference.kind().entity(), reference.id()))
    }

    /// Same as [`resolve`](Self::resolve) but from the tag and id as they
    /// arrive over the wire.
    pub async fn resolve_tagged(&self, kind: InstrumentKind, id: u64) -> Result<Instrument> {
        self.resolve(InstrumentRef::new(kind, id)).await
    }

    /// The discriminator stored alongside a payment using `instrument`.
    pub fn tag_for(instrument: &Instrument) -> InstrumentKind {
        instrument.kind()
    }
}
