//! Application layer: the capture workflow and the instrument resolver it
//! depends on.
//!
//! `CaptureReconciler` owns the storage ports and the gateway; the domain
//! types it moves between states live in `crate::domain`.

pub mod capture;
pub mod resolver;
