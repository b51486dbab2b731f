//! Domain layer: records, value objects and the ports the application layer
//! drives.

pub mod instrument;
pub mod money;
pub mod order;
pub mod payment;
pub mod ports;

pub use money::Money;

pub type OrderId = u64;
pub type PaymentId = u64;
pub type CardId = u64;
