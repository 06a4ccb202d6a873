#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # xsoar-client
//!
//! Remote client facade for the XSOAR management API.
//!
//! The reconciler never talks HTTP directly. It goes through [`RemoteApi`],
//! a capability-typed interface with `list`/`get`/`create`/`update`/`delete`
//! per object kind plus the two account-only operations (role details and
//! host migration). Every call returns the raw JSON body together with the
//! transport metadata, or an [`ApiError`] carrying the remote status and body.
//!
//! [`HttpRemote`] is the reqwest-backed implementation.
//!
//! ## Example
//!
//! ```ignore
//! use xsoar_client::{ClientConfig, HttpRemote, RemoteApi, Route};
//! use xsoar_core::ObjectKind;
//!
//! let config = ClientConfig::new("https://xsoar.example.com".parse()?, api_key);
//! let remote = HttpRemote::with_config(config)?;
//! let groups = remote.list(&Route::new(ObjectKind::HaGroup)).await?;
//! println!("{}", groups.body);
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod remote;
pub mod route;

pub use client::HttpRemote;
pub use config::ClientConfig;
pub use error::{ApiError, ApiResult, Error, Result};
pub use remote::{RawResponse, RemoteApi};
pub use route::{Route, account_key};
