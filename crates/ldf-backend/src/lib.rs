//! # ldf-backend
//!
//! The contract between the reconciliation engine and identity backends.
//!
//! A [`Backend`] is the connection to one identity store. It is opened once
//! per process and hands out short-lived [`ServiceUser`] and [`ServiceGroup`]
//! handles for a single reconciliation. Mandatory operations are required
//! trait methods; optional lifecycle operations have defaults and are
//! advertised through [`Capabilities`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod provider;

pub use error::{BackendError, BackendResult};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::{MemoryAccount, MemoryBackend};
pub use provider::{Backend, Capabilities, DeletionOrder, ServiceGroup, ServiceUser};
