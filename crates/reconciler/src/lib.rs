//! Declarative reconciliation of XSOAR objects.
//!
//! The host declares desired configuration for accounts, HA groups, hosts,
//! integration instances, classifiers and mappers; this crate drives the
//! management API toward it:
//!
//! - **Normalize**: decode weakly-typed responses once into canonical objects
//! - **Plan**: diff desired against last-known state into an ordered write set
//! - **Retry**: ride out the remote system's propagation delay
//! - **Reconcile**: create, read, update, delete and import per object kind
//!
//! # Example
//!
//! ```ignore
//! use xsoar_reconciler::{
//!     AccountReconciler, AccountSpec, Operation, Outcome, Provider, ProviderConfig, drive,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let (provider, diagnostics) = Provider::configure(&ProviderConfig::default());
//!     for diagnostic in &diagnostics {
//!         eprintln!("{diagnostic}");
//!     }
//!
//!     let accounts = AccountReconciler::new(provider);
//!     let desired = AccountSpec::new("acme", "grp1");
//!     match drive(&accounts, Operation::Create(desired)).await {
//!         Outcome::State(account) => println!("created {}", account.id),
//!         Outcome::Removed => {}
//!         Outcome::Failed(diagnostics) => eprintln!("{diagnostics:?}"),
//!     }
//! }
//! ```

#![forbid(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod error;
pub mod normalize;
pub mod plan;
pub mod provider;
pub mod reconciler;
pub mod resources;
pub mod retry;
pub mod types;

// Re-export main types
pub use error::{Error, Result, ShapeError, ShapeProblem};
pub use normalize::Canonical;
pub use plan::{AccountStep, FullSave, Plan, UpdatePlan};
pub use provider::{Provider, ProviderConfig, ProviderContext, Setting};
pub use reconciler::{Operation, Outcome, Reconcile, drive};
pub use resources::{
    AccountReconciler, ClassifierReconciler, HaGroupReconciler, HostReconciler,
    IntegrationInstanceReconciler, MapperReconciler,
};
pub use retry::{RetryAll, RetryClassifier, RetryController, RetryPolicy, Retryability, TransientOnly};
pub use types::{
    Account, AccountSpec, Classifier, ClassifierSpec, HaGroup, HaGroupSpec, Host, HostSpec,
    IntegrationInstance, IntegrationInstanceSpec, Mapper, MapperDirection, MapperSpec, StringSet,
};
