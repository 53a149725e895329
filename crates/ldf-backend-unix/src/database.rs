//! Readers for `passwd(5)` and `group(5)` files.

use std::fs;
use std::path::Path;

use crate::error::{UnixError, UnixResult};

/// One line of `passwd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswdEntry {
    /// Login name.
    pub login: String,
    /// Numeric user id.
    pub uid: u32,
    /// Numeric primary group id.
    pub gid: u32,
    /// Comment field; holds the federated unique id.
    pub gecos: String,
    /// Home directory.
    pub home: String,
    /// Login shell.
    pub shell: String,
}

/// One line of `group`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    /// Group name.
    pub name: String,
    /// Numeric group id.
    pub gid: u32,
    /// Supplementary members.
    pub members: Vec<String>,
}

/// Encodes a unique id for the GECOS field.
///
/// `passwd` is colon separated, so `:` (and the escape character `%`) are
/// percent-encoded.
#[must_use]
pub fn encode_gecos(unique_id: &str) -> String {
    unique_id.replace('%', "%25").replace(':', "%3A")
}

/// Parses `passwd` content. Malformed lines are skipped.
#[must_use]
pub fn parse_passwd(content: &str) -> Vec<PasswdEntry> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            let [login, _pw, uid, gid, gecos, home, shell] = fields.as_slice() else {
                tracing::warn!(%line, "skipping malformed passwd line");
                return None;
            };
            Some(PasswdEntry {
                login: (*login).to_string(),
                uid: uid.parse().ok()?,
                gid: gid.parse().ok()?,
                gecos: (*gecos).to_string(),
                home: (*home).to_string(),
                shell: (*shell).to_string(),
            })
        })
        .collect()
}

/// Parses `group` content. Malformed lines are skipped.
#[must_use]
pub fn parse_group(content: &str) -> Vec<GroupEntry> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            let [name, _pw, gid, members] = fields.as_slice() else {
                tracing::warn!(%line, "skipping malformed group line");
                return None;
            };
            Some(GroupEntry {
                name: (*name).to_string(),
                gid: gid.parse().ok()?,
                members: members
                    .split(',')
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect(),
            })
        })
        .collect()
}

fn read(path: &Path) -> UnixResult<String> {
    fs::read_to_string(path).map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "cannot read account database");
        UnixError::database(e.to_string())
    })
}

/// Reads all accounts.
pub fn read_passwd(path: &Path) -> UnixResult<Vec<PasswdEntry>> {
    Ok(parse_passwd(&read(path)?))
}

/// Reads all groups.
pub fn read_group(path: &Path) -> UnixResult<Vec<GroupEntry>> {
    Ok(parse_group(&read(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_passwd() {
        let entries = parse_passwd(
            "root:x:0:0:root:/root:/bin/bash\n\
             \n\
             jdoe:x:1001:100:abc123@https%3A//issuer.example.org:/home/jdoe:/bin/sh\n\
             broken:x:1002\n",
        );
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].login, "jdoe");
        assert_eq!(entries[1].uid, 1001);
        assert_eq!(
            entries[1].gecos,
            encode_gecos("abc123@https://issuer.example.org")
        );
        assert_eq!(entries[1].shell, "/bin/sh");
    }

    #[test]
    fn gecos_encoding_removes_separators() {
        assert_eq!(encode_gecos("a@https://x"), "a@https%3A//x");
        assert_eq!(encode_gecos("100%:"), "100%25%3A");
        assert_eq!(encode_gecos("plain@issuer"), "plain@issuer");
    }

    #[test]
    fn parses_group_members() {
        let groups = parse_group("users:x:100:\nhpc:x:1000:jdoe,jane\n");
        assert_eq!(groups[0].members, Vec::<String>::new());
        assert_eq!(groups[1].gid, 1000);
        assert_eq!(groups[1].members, vec!["jdoe", "jane"]);
    }

    #[test]
    fn missing_file_is_a_database_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_passwd(&dir.path().join("passwd")).unwrap_err();
        assert!(matches!(err, UnixError::Database(_)));
    }
}
