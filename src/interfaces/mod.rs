//! Inbound and outbound formats: JSON fixtures in, CSV capture report out.

pub mod csv;
pub mod fixtures;
