//! Issuer-side revocation registry management for Indy-style ledgers.
//!
//! This crate covers the lifecycle of an issuer's revocation registries
//! (create, generate, publish, rotate) and of the per-credential revocation
//! records hanging off them, plus the batching, publication and
//! ledger-reconciliation logic tying the two together. Wallet storage, the
//! ledger client and the anoncreds signer are reached through traits so that
//! embedders can plug in their own backends.

#![allow(clippy::result_large_err)]

#[macro_use]
extern crate log;

#[macro_use]
extern crate serde;

#[macro_use]
extern crate serde_json;

pub mod anoncreds;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod manager;
pub mod primitives;
pub mod records;
pub mod tails;
pub mod utils;
pub mod wallet;
