//! Command implementations.

pub mod check_config;
pub mod reconcile;
pub mod sanitize;

pub use check_config::run_check_config;
pub use reconcile::{process, run_reconcile};
pub use sanitize::run_sanitize;

use ldf_backend::Backend;
use ldf_backend_ldap::{LdapBackend, LdapConfig};
use ldf_backend_unix::{UnixBackend, UnixConfig};
use ldf_core::{BackendKind, Config};

use crate::error::{CliError, CliResult};

/// Opens the backend selected by `[adapter] backend`.
pub fn open_backend(config: &Config) -> CliResult<Box<dyn Backend>> {
    let kind = config.adapter.backend;
    tracing::debug!(backend = %kind, "opening backend");

    match kind {
        BackendKind::LocalUnix => {
            let section: UnixConfig = config.backend_section(kind.as_str())?;
            let backend = UnixBackend::new(section).map_err(CliError::backend)?;
            Ok(Box::new(backend))
        }
        BackendKind::Ldap => {
            let section: LdapConfig = config.backend_section(kind.as_str())?;
            let backend = LdapBackend::connect(section).map_err(CliError::backend)?;
            Ok(Box::new(backend))
        }
    }
}
