//! Shared vocabulary for XSOAR reconciliation.
//!
//! - [`ObjectKind`] names the six remote object kinds the reconciler manages.
//! - [`Diagnostic`] and [`Diagnostics`] are what the host receives when an
//!   operation fails or configuration is incomplete.

#![forbid(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod diagnostic;
pub mod kind;

pub use diagnostic::{Diagnostic, Diagnostics, Severity};
pub use kind::ObjectKind;
