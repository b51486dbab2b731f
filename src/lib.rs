//! Order capture: reconciles an order's payments against its totals, charges
//! them through a payment processor and settles the order.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
