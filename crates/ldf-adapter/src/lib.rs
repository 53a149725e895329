//! # ldf-adapter
//!
//! Reconciles federated identities with accounts in a local identity store.
//!
//! Given verified claims about a user and a requested target state, the
//! [`Adapter`] checks the user's assurance, creates or removes the local
//! account, keeps group memberships and SSH keys in place and reports a single
//! [`Outcome`](ldf_model::Outcome).
//!
//! ## Example
//!
//! ```no_run
//! use ldf_adapter::Adapter;
//! use ldf_core::Config;
//! use ldf_model::{Target, UserInfo};
//! # fn backend() -> Box<dyn ldf_backend::Backend> { unimplemented!() }
//!
//! let config = Config::load(None)?;
//! let backend = backend();
//! let adapter = Adapter::new(&config, backend.as_ref())?;
//!
//! let info = UserInfo::new("abc123@https://issuer.example.org").with_preferred_username("jdoe");
//! let outcome = adapter.reach_state(&info, Target::Deployed);
//! println!("{}", outcome.to_json());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod assurance;
pub mod error;
pub mod migration;
pub mod user;

pub use adapter::Adapter;
pub use assurance::{AssuranceExpr, AssurancePolicy};
pub use error::{AdapterError, AdapterResult};
pub use migration::{migrate_group_names, GroupMigration};
pub use user::User;
