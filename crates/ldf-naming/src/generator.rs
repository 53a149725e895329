//! Username suggestion strategies.
//!
//! A generator is created per reconciliation and asked for suggestions until
//! the backend reports one as free. Generators never suggest the same name
//! twice and never move backwards.

use ldf_core::{GeneratorMode, UsernameGeneratorConfig};
use ldf_model::UserInfo;

use crate::error::{NameError, NameResult};
use crate::sanitize::sanitize;

// ============================================================================
// Friendly names
// ============================================================================

/// How a friendly candidate is assembled from the claims.
#[derive(Debug, Clone, Copy)]
enum Template {
    PreferredUsername,
    GivenName,
    FamilyName,
    /// Prefixes of given and family name (`None` takes the whole name).
    Combined {
        given: Option<usize>,
        family: Option<usize>,
    },
    Joined(&'static str),
    FamilyThenInitial,
    EmailLocalPart,
}

const TEMPLATES: &[Template] = &[
    Template::PreferredUsername,
    Template::GivenName,
    Template::Combined { given: Some(1), family: None },
    Template::Combined { given: None, family: Some(1) },
    Template::Combined { given: Some(2), family: None },
    Template::Combined { given: None, family: Some(2) },
    Template::Combined { given: Some(3), family: None },
    Template::Combined { given: None, family: Some(3) },
    Template::Combined { given: Some(4), family: None },
    Template::Combined { given: None, family: Some(4) },
    Template::Combined { given: Some(1), family: Some(1) },
    Template::Combined { given: Some(2), family: Some(2) },
    Template::Combined { given: Some(3), family: Some(3) },
    Template::Combined { given: Some(1), family: Some(2) },
    Template::Combined { given: Some(2), family: Some(1) },
    Template::Combined { given: None, family: None },
    Template::Joined("_"),
    Template::Joined("-"),
    Template::FamilyName,
    Template::FamilyThenInitial,
    Template::EmailLocalPart,
];

fn prefix(value: &str, len: Option<usize>) -> String {
    match len {
        Some(n) => value.chars().take(n).collect(),
        None => value.to_string(),
    }
}

impl Template {
    /// Formats the raw candidate; `None` if a required claim is missing.
    fn render(self, info: &UserInfo) -> Option<String> {
        let given = info.given_name.as_deref().filter(|s| !s.is_empty());
        let family = info.family_name.as_deref().filter(|s| !s.is_empty());

        match self {
            Self::PreferredUsername => info.preferred_username.clone(),
            Self::GivenName => given.map(str::to_string),
            Self::FamilyName => family.map(str::to_string),
            Self::Combined {
                given: given_len,
                family: family_len,
            } => Some(format!(
                "{}{}",
                prefix(given?, given_len),
                prefix(family?, family_len)
            )),
            Self::Joined(separator) => Some(format!("{}{separator}{}", given?, family?)),
            Self::FamilyThenInitial => Some(format!("{}{}", family?, prefix(given?, Some(1)))),
            Self::EmailLocalPart => info
                .email
                .as_deref()
                .and_then(|email| email.split('@').next())
                .map(str::to_string),
        }
    }
}

/// Suggests human friendly usernames derived from the user's claims.
///
/// The preferred username comes first, then the given name, then
/// combinations of given and family name.
#[derive(Debug, Clone)]
pub struct FriendlyNameGenerator {
    info: UserInfo,
    next_template: usize,
    tried: Vec<String>,
}

impl FriendlyNameGenerator {
    /// Creates a generator for the given claims.
    #[must_use]
    pub fn new(info: &UserInfo) -> Self {
        Self {
            info: info.clone(),
            next_template: 0,
            tried: Vec::new(),
        }
    }

    /// Returns the next unused candidate, skipping `forbidden` names.
    ///
    /// Returns `None` when all templates are exhausted.
    pub fn suggest_name(&mut self, forbidden: &[String]) -> Option<String> {
        while let Some(template) = TEMPLATES.get(self.next_template) {
            self.next_template += 1;

            let Some(raw) = template.render(&self.info).filter(|s| !s.is_empty()) else {
                continue;
            };
            let candidate = match sanitize(&raw) {
                Ok(name) => name.to_lowercase(),
                Err(e) => {
                    tracing::debug!(candidate = %raw, error = %e, "skipping username candidate");
                    continue;
                }
            };
            if self.tried.contains(&candidate) || forbidden.contains(&candidate) {
                continue;
            }

            self.tried.push(candidate.clone());
            return Some(candidate);
        }
        None
    }

    /// Names suggested so far.
    #[must_use]
    pub fn tried_names(&self) -> &[String] {
        &self.tried
    }
}

// ============================================================================
// Pooled names
// ============================================================================

/// Suggests numbered names from a pool: `prefix001`, `prefix002`, ...
#[derive(Debug, Clone)]
pub struct PooledNameGenerator {
    prefix: String,
    digits: usize,
    counter: u64,
    tried: Vec<String>,
}

impl PooledNameGenerator {
    /// Creates a generator with three digit numbers.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_digits(prefix, 3)
    }

    /// Creates a generator with the given number of digits.
    #[must_use]
    pub fn with_digits(prefix: impl Into<String>, digits: usize) -> Self {
        Self {
            prefix: prefix.into(),
            digits: digits.max(1),
            counter: 1,
            tried: Vec::new(),
        }
    }

    fn capacity(&self) -> u64 {
        u32::try_from(self.digits)
            .ok()
            .and_then(|digits| 10u64.checked_pow(digits))
            .map_or(u64::MAX, |limit| limit - 1)
    }

    /// Returns the next pool name, skipping `forbidden` names.
    ///
    /// Returns `None` once every number of the configured width is used.
    pub fn suggest_name(&mut self, forbidden: &[String]) -> Option<String> {
        while self.counter <= self.capacity() {
            let candidate = format!("{}{:0width$}", self.prefix, self.counter, width = self.digits);
            self.counter += 1;
            if forbidden.contains(&candidate) {
                continue;
            }
            self.tried.push(candidate.clone());
            return Some(candidate);
        }
        None
    }

    /// Names suggested so far.
    #[must_use]
    pub fn tried_names(&self) -> &[String] {
        &self.tried
    }
}

// ============================================================================
// Strategy selection
// ============================================================================

/// A configured username generator.
#[derive(Debug, Clone)]
pub enum NameGenerator {
    /// Names derived from the claims.
    Friendly(FriendlyNameGenerator),
    /// Numbered names from a pool.
    Pooled(PooledNameGenerator),
}

impl NameGenerator {
    /// Creates the generator selected by the configuration.
    ///
    /// Pooled names default to the user's primary group as prefix.
    pub fn from_config(config: &UsernameGeneratorConfig, info: &UserInfo) -> NameResult<Self> {
        match config.mode {
            GeneratorMode::Friendly => Ok(Self::Friendly(FriendlyNameGenerator::new(info))),
            GeneratorMode::Pooled => {
                let prefix = config
                    .pool_prefix
                    .as_deref()
                    .or(info.primary_group.as_deref())
                    .ok_or_else(|| {
                        NameError::config("pooled names need a pool_prefix or a primary group")
                    })?;
                Ok(Self::Pooled(PooledNameGenerator::with_digits(
                    prefix,
                    config.pool_digits,
                )))
            }
        }
    }

    /// Returns the next candidate, or `None` when exhausted.
    pub fn suggest_name(&mut self, forbidden: &[String]) -> Option<String> {
        match self {
            Self::Friendly(generator) => generator.suggest_name(forbidden),
            Self::Pooled(generator) => generator.suggest_name(forbidden),
        }
    }

    /// Names suggested so far.
    #[must_use]
    pub fn tried_names(&self) -> &[String] {
        match self {
            Self::Friendly(generator) => generator.tried_names(),
            Self::Pooled(generator) => generator.tried_names(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn marcus() -> UserInfo {
        UserInfo::new("d7a53cbe@egi.eu")
            .with_preferred_username("mhardt")
            .with_name("Marcus", "Hardt")
            .with_email("hardt@kit.edu")
    }

    #[test]
    fn friendly_starts_with_preferred_then_given_name() {
        let mut generator = FriendlyNameGenerator::new(&marcus());
        assert_eq!(generator.suggest_name(&[]).as_deref(), Some("mhardt"));
        assert_eq!(generator.suggest_name(&[]).as_deref(), Some("marcus"));
        assert_eq!(generator.tried_names(), ["mhardt", "marcus"]);
    }

    #[test]
    fn friendly_state_is_per_instance() {
        let info = marcus();
        let mut first = FriendlyNameGenerator::new(&info);
        first.suggest_name(&[]);
        first.suggest_name(&[]);

        let mut second = FriendlyNameGenerator::new(&info);
        assert_eq!(second.suggest_name(&[]).as_deref(), Some("mhardt"));
    }

    #[test]
    fn friendly_yields_many_distinct_names() {
        let mut generator = FriendlyNameGenerator::new(&marcus());
        let mut seen = HashSet::new();
        while let Some(name) = generator.suggest_name(&[]) {
            assert!(seen.insert(name), "suggested a name twice");
        }
        assert!(seen.len() >= 17, "only {} names", seen.len());
        assert_eq!(generator.suggest_name(&[]), None);
    }

    #[test]
    fn friendly_skips_forbidden_names() {
        let mut generator = FriendlyNameGenerator::new(&marcus());
        let forbidden = vec!["mhardt".to_string()];
        assert_eq!(generator.suggest_name(&forbidden).as_deref(), Some("marcus"));
    }

    #[test]
    fn friendly_skips_templates_with_missing_claims() {
        let info = UserInfo::new("x@y").with_email("jane.doe@example.org");
        let mut generator = FriendlyNameGenerator::new(&info);
        assert_eq!(generator.suggest_name(&[]).as_deref(), Some("jane_doe"));
        assert_eq!(generator.suggest_name(&[]), None);
    }

    #[test]
    fn friendly_sanitizes_candidates() {
        let info = UserInfo::new("x@y").with_name("Jürgen", "Groß");
        let mut generator = FriendlyNameGenerator::new(&info);
        assert_eq!(generator.suggest_name(&[]).as_deref(), Some("juergen"));
        assert_eq!(generator.suggest_name(&[]).as_deref(), Some("jgross"));
    }

    #[test]
    fn pooled_counts_up() {
        let mut generator = PooledNameGenerator::new("pytest");
        assert!(generator.tried_names().is_empty());
        assert_eq!(generator.suggest_name(&[]).as_deref(), Some("pytest001"));
        assert_eq!(generator.suggest_name(&[]).as_deref(), Some("pytest002"));
    }

    #[test]
    fn pooled_is_exhausted_after_its_width() {
        let mut generator = PooledNameGenerator::with_digits("p", 1);
        let names: Vec<_> = std::iter::from_fn(|| generator.suggest_name(&[])).collect();
        assert_eq!(names.len(), 9);
        assert_eq!(names.last().map(String::as_str), Some("p9"));
    }

    #[test]
    fn from_config_defaults_pool_prefix_to_primary_group() {
        let config = UsernameGeneratorConfig {
            mode: GeneratorMode::Pooled,
            pool_prefix: None,
            pool_digits: 2,
        };
        let info = UserInfo::new("x@y").with_primary_group("guests");
        let mut generator = NameGenerator::from_config(&config, &info).unwrap();
        assert_eq!(generator.suggest_name(&[]).as_deref(), Some("guests01"));

        let err = NameGenerator::from_config(&config, &UserInfo::new("x@y")).unwrap_err();
        assert!(matches!(err, NameError::Configuration(_)));
    }
}
