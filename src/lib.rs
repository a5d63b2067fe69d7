//! certchain: role-gated certificates and product batches on an append-only
//! ledger, for supply-chain transparency.
//!
//! This crate provides:
//! - A role authority (Certifier / Producer / Verifier) under a single admin
//! - The certificate asset class with a time-derived validity predicate
//! - The batch asset class: verification, custody transfer, certificate links
//! - A registry that commits each operation all-or-nothing and replays
//!   deterministically from history
//! - A hash-chained SQLite journal standing in for the host ledger
//!
//! The CLI wrapper lives in `src/main.rs`.

#![deny(unsafe_code)]

pub mod config;
pub mod error;

pub mod batch;
pub mod certificate;
pub mod events;
pub mod journal;
pub mod links;
pub mod operation;
pub mod registry;
pub mod roles;
pub mod service;
pub mod types;
pub mod util;
