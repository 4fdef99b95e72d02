// Fallible APIs across this crate return the one concrete `FabricError` contract.
// Per-function `# Errors` sections would restate it without adding information.
#![allow(
    clippy::missing_errors_doc,
    reason = "every fallible API returns FabricError; per-item sections would restate one contract"
)]

pub mod auth;
pub mod definition;
pub mod deploy;
pub mod error;
pub mod items;
pub mod mapping;
pub mod operations;
pub mod pbir;
pub mod rebind;
#[cfg(test)]
pub(crate) mod testing;
pub mod transport;
pub mod workspaces;

pub use error::{FabricError, Result};
pub use reqwest::Method;
pub use transport::{ApiResponse, FABRIC_API_BASE, Gateway, HttpGateway};
