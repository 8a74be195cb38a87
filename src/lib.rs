//! Paygate - ACH transfer compiler and batching pipeline
//!
//! Turns funds-movement requests into populated ACH files, proves account
//! ownership with micro-deposits and batches pending records into merged
//! upload files.
//!
//! # Modules
//!
//! - [`money`] - Integer-cents amount with ISO-4217 symbol
//! - [`model`] - Depositories, originators, receivers, transfers
//! - [`ach`] - ACH file records and the ACH service client
//! - [`compiler`] - SEC batch compilers and file assembly
//! - [`micro_deposit`] - Micro-deposit verification workflow
//! - [`cursor`] - Watermark cursors over unmerged records
//! - [`limits`] - Rolling transfer limits
//! - [`transfers`] - Transfer submission
//! - [`merge`] - Merge pass grouping records into upload files
//! - [`repository`] - Persistence traits, in-memory and PostgreSQL

// Foundations
pub mod calendar;
pub mod error;
pub mod money;
pub mod rng;
pub mod secrets;

// Domain
pub mod model;

// ACH records and compilers
pub mod ach;
pub mod compiler;

// Workflows
pub mod cursor;
pub mod limits;
pub mod merge;
pub mod micro_deposit;
pub mod transfers;

// Infrastructure
pub mod cache;
pub mod config;
pub mod logging;
pub mod repository;

// Convenient re-exports at crate root
pub use error::ErrorKind;
pub use money::{Amount, AmountError, Currency};
