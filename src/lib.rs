//! Fuel Ledger
//!
//! Mileage and fuel-cost tracking for a shared vehicle. Trips and fuelings
//! are kept in two append-only tables ordered by odometer, and fuel cost is
//! split among drivers by the kilometers each drove since the previous
//! fueling.

pub mod config;
pub mod core;
pub mod session;
pub mod store;
