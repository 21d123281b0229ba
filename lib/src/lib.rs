#![doc = include_str!("../README.md")]

#[cfg(all(feature = "crypto-ring", feature = "crypto-aws-lc-rs"))]
compile_error!("Features 'crypto-ring' and 'crypto-aws-lc-rs' are mutually exclusive and cannot be enabled together");

#[cfg(not(any(feature = "crypto-ring", feature = "crypto-aws-lc-rs")))]
compile_error!("'crypto-ring' OR 'crypto-aws-lc-rs' must be enabled");

#[cfg(feature = "crypto-ring")]
pub(crate) use rustls::crypto::ring::default_provider as default_crypto_provider;

#[cfg(feature = "crypto-aws-lc-rs")]
pub(crate) use rustls::crypto::aws_lc_rs::default_provider as default_crypto_provider;

/// Client TLS configuration with deferred hostname verification
pub mod client;
/// Establishing hostname-verified TLS connections
pub mod connector;
/// Navigable representation of decoded JSON documents
pub mod json;

mod config;
mod consent;
mod error;
mod identity;
mod name;
mod trust;
mod versions;

pub use config::*;
pub use consent::*;
pub use error::*;
pub use identity::*;
pub use name::*;
pub use trust::*;
pub use versions::*;

pub(crate) mod pem;

pub use pem::PemError;
