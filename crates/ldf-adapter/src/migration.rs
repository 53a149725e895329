//! Migration of group names created by adapter release 0.4.4.
//!
//! That release mapped some labels to different local names. When a group
//! exists only under its legacy name it is renamed; when both names exist an
//! operator has to merge them by hand.

use ldf_backend::Backend;
use ldf_naming::{sanitize, sanitize_legacy};

use crate::error::AdapterResult;

/// Identifier of this fix in log messages.
pub const FIX_ID: &str = "FIX v0.4.4";

/// What the migration did for one group label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupMigration {
    /// The legacy group was renamed to its current name.
    Renamed {
        /// Legacy name.
        from: String,
        /// Current name.
        to: String,
    },
    /// Both groups exist; nothing was changed.
    Conflict {
        /// Label the groups were derived from.
        label: String,
        /// Legacy name.
        legacy: String,
        /// Current name.
        current: String,
    },
}

/// Renames groups that still carry their legacy name.
///
/// Labels whose current and legacy names agree, or whose legacy group does
/// not exist, are left alone.
pub fn migrate_group_names(
    backend: &dyn Backend,
    labels: &[String],
) -> AdapterResult<Vec<GroupMigration>> {
    let mut actions = Vec::new();

    for label in labels {
        let current = sanitize(label)?;
        let Some(legacy) = sanitize_legacy(label) else {
            continue;
        };
        if legacy == current || !backend.group_exists(&legacy)? {
            continue;
        }

        if backend.group_exists(&current)? {
            tracing::error!(
                "{FIX_ID}: Two local groups exist for {label}, created with different versions \
                 of the adapter: {legacy} and {current}. Manual intervention required."
            );
            tracing::error!(
                "{FIX_ID}: make sure all files owned by group {legacy} are owned by group \
                 {current} before removing group {legacy}"
            );
            actions.push(GroupMigration::Conflict {
                label: label.clone(),
                legacy,
                current,
            });
        } else {
            tracing::warn!("{FIX_ID}: renaming group {legacy} to {current}");
            backend.rename_group(&legacy, &current)?;
            actions.push(GroupMigration::Renamed {
                from: legacy,
                to: current,
            });
        }
    }

    Ok(actions)
}
