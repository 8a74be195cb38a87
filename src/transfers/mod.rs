//! Transfer submission
//!
//! Resolves a transfer's entities, enforces limits, compiles the ACH file and
//! hands it to the ACH service. The transfer row is written last, so a failed
//! submission leaves nothing behind.
//!
//! ```text
//! resolve -> limits -> construct_file -> create (retry) -> validate -> persist
//!                                                          |
//!                                                  fail: delete remote file
//! ```

pub mod error;
pub mod service;

pub use error::TransferError;
pub use service::TransferService;
