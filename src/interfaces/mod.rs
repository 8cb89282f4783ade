//! Adapters that feed commands into the ledger and report its state.

pub mod csv;
