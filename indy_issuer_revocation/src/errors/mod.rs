pub mod error;
mod mapping_ledger;
mod mapping_others;
