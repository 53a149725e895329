//! LDAP entries returned by searches.

use std::collections::HashMap;

use ldap3::SearchEntry;

/// Represents an LDAP entry with parsed attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LdapEntry {
    /// Distinguished Name.
    pub dn: String,

    /// Attributes (all values are multi-valued).
    pub attributes: HashMap<String, Vec<String>>,
}

impl LdapEntry {
    /// Creates a new LDAP entry from search result.
    #[must_use]
    pub fn from_search_entry(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attributes: entry.attrs,
        }
    }

    /// Creates an entry from attribute pairs.
    #[must_use]
    pub fn new<'a>(dn: impl Into<String>, attrs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut attributes: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in attrs {
            attributes
                .entry(name.to_string())
                .or_default()
                .push(value.to_string());
        }
        Self {
            dn: dn.into(),
            attributes,
        }
    }

    /// Gets a single-valued attribute.
    ///
    /// Attribute names are matched case-insensitively.
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.get_attrs(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Gets a multi-valued attribute.
    #[must_use]
    pub fn get_attrs(&self, name: &str) -> Option<&Vec<String>> {
        self.attributes.get(name).or_else(|| {
            self.attributes
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, values)| values)
        })
    }

    /// Gets a numeric attribute.
    #[must_use]
    pub fn get_number(&self, name: &str) -> Option<u32> {
        self.get_attr(name).and_then(|v| v.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ldap_entry_get_attr() {
        let entry = LdapEntry::new(
            "uid=jdoe,ou=users,dc=example",
            [
                ("uid", "jdoe"),
                ("uidNumber", "1000"),
                ("memberOf", "cn=hpc"),
                ("memberOf", "cn=staff"),
            ],
        );

        assert_eq!(entry.get_attr("uid"), Some("jdoe"));
        assert_eq!(entry.get_attr("UIDNUMBER"), Some("1000"));
        assert_eq!(entry.get_number("uidNumber"), Some(1000));
        assert_eq!(entry.get_number("uid"), None);
        assert_eq!(entry.get_attrs("memberOf").map(Vec::len), Some(2));
        assert_eq!(entry.get_attr("missing"), None);
    }
}
