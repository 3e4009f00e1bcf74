//! Process wiring for the change-driven notification subsystem: environment
//! configuration, concrete `DeliveryClient`/`WorkerSpawner` adapters, the
//! ledger-signal-to-notifications bridge, and a liveness/readiness HTTP
//! surface. The binary entry point lives in `src/bin/default.rs`, matching
//! the teacher's split between a library crate and a thin `bin/default.rs`.

pub mod config;
pub mod health;
pub mod ledger_bridge;
pub mod wiring;
