//! Logic Module - Business Logic & Engines
//!
//! Subsystems: Knowledge Base, Config Store, History Ledger,
//! Inference Engine, Weather Risk Advisor.

pub mod config;
pub mod history;
pub mod inference;
pub mod knowledge;
pub mod weather;
