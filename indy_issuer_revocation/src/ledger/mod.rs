pub mod base_ledger;
pub mod error;
