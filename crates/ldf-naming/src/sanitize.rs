//! Mapping of arbitrary labels to shadow compatible account names.
//!
//! Names produced here start with `[a-z_]`, contain only `[-0-9_a-z]` (plus a
//! `..` marker where a name was shortened) and are at most
//! [`MAX_NAME_LEN`] characters long.

use crate::error::{NameError, NameResult};

/// Maximum length of user and group names accepted by shadow-utils.
pub const MAX_NAME_LEN: usize = 32;

/// Transliterates, folds to ASCII, lowercases and replaces every character
/// outside `[-0-9_a-z]` with `_`.
///
/// Shared by the current and the legacy mapping; only the handling of the
/// first character and of overlong names differs between them.
pub(crate) fn normalize(raw: &str) -> String {
    let mut translated = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            'ä' => translated.push_str("ae"),
            'ö' => translated.push_str("oe"),
            'ü' => translated.push_str("ue"),
            'Ä' => translated.push_str("Ae"),
            'Ö' => translated.push_str("Oe"),
            'Ü' => translated.push_str("Ue"),
            'ß' => translated.push_str("ss"),
            '!' => translated.push('i'),
            '$' => translated.push('s'),
            '*' => translated.push('x'),
            '@' => translated.push_str("_at_"),
            _ => translated.push(c),
        }
    }

    deunicode::deunicode_with_tofu(&translated, "")
        .to_ascii_lowercase()
        .chars()
        .map(|c| if is_name_char(c) { c } else { '_' })
        .collect()
}

pub(crate) const fn is_name_char(c: char) -> bool {
    c == '-' || c == '_' || c.is_ascii_digit() || c.is_ascii_lowercase()
}

pub(crate) fn starts_like_a_name(word: &str) -> bool {
    word.chars()
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_lowercase())
}

/// Maps a label to a shadow compatible name.
///
/// Overlong names are shortened inside the fragment following the first
/// underscore, which is prefixed with `..`. Names without an underscore lose
/// their leading characters instead and start with `__`.
///
/// # Errors
///
/// Returns [`NameError::TooLong`] when the second fragment is too short to
/// absorb the excess characters.
pub fn sanitize(raw: &str) -> NameResult<String> {
    let mut word = normalize(raw);

    if !starts_like_a_name(&word) {
        word = if word.len() >= MAX_NAME_LEN {
            format!("_{}", &word[1..])
        } else {
            format!("_{word}")
        };
    }

    let excess = word.len().saturating_sub(MAX_NAME_LEN);
    if excess > 0 {
        let mut fragments: Vec<String> = word.split('_').map(str::to_string).collect();
        let shortened = if fragments.len() == 1 {
            format!("__{}", &word[excess + 2..])
        } else {
            // The `..` marker costs two characters of its own.
            if fragments[1].len() < excess + 2 {
                tracing::error!(name = %word, length = word.len(), "user or group name is too long");
                return Err(NameError::TooLong { name: word, excess });
            }
            let cut = format!("..{}", &fragments[1][excess + 2..]);
            fragments[1] = cut;
            fragments.join("_")
        };
        word = shortened;
    }

    if word != raw {
        tracing::debug!(from = %raw, to = %word, "name changed for shadow compatibility");
    }
    Ok(word)
}

/// [`sanitize`] for optional labels; `None` stays `None`.
pub fn sanitize_opt(raw: Option<&str>) -> NameResult<Option<String>> {
    raw.map(sanitize).transpose()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn transliterates_and_replaces() {
        assert_eq!(sanitize("Marcus Hardt").unwrap(), "marcus_hardt");
        assert_eq!(sanitize("Jürgen Groß").unwrap(), "juergen_gross");
        assert_eq!(sanitize("hello@world!").unwrap(), "hello_at_worldi");
        assert_eq!(sanitize("Ça$h*").unwrap(), "cashx");
        assert_eq!(sanitize("vo.example.org:admins").unwrap(), "vo_example_org_admins");
    }

    #[test]
    fn prefixes_illegal_first_character() {
        assert_eq!(sanitize("42nd").unwrap(), "_42nd");
        assert_eq!(sanitize("-admins").unwrap(), "_-admins");
        assert_eq!(sanitize("").unwrap(), "_");
    }

    #[test]
    fn replaces_illegal_first_character_of_long_names() {
        let raw = format!("1{}", "a".repeat(40));
        let name = sanitize(&raw).unwrap();
        assert_eq!(name, format!("_..{}", "a".repeat(29)));
        assert_eq!(name.len(), MAX_NAME_LEN);
    }

    #[test]
    fn shortens_names_without_underscore_from_the_front() {
        let name = sanitize(&"a".repeat(40)).unwrap();
        assert_eq!(name, format!("__{}", "a".repeat(30)));
    }

    #[test]
    fn shortens_second_fragment() {
        let name = sanitize("Fürther Informationstechnikverein e.V.").unwrap();
        assert_eq!(name, "fuerther_..onstechnikverein_e_v_");
        assert_eq!(name.len(), MAX_NAME_LEN);
    }

    #[test]
    fn fails_when_second_fragment_is_too_short() {
        let raw = "abcdefghijklmnopqrstuvwxyz_ab_cdefghijklmnopqrstuvwxyz";
        assert!(matches!(
            sanitize(raw),
            Err(NameError::TooLong { excess: 24, .. })
        ));
    }

    #[test]
    fn fails_instead_of_overshooting_by_one() {
        // Cutting "xyz" to ".." would leave 33 characters.
        let raw = format!("{}_xyz", "a".repeat(30));
        assert!(sanitize(&raw).is_err());
    }

    #[test]
    fn none_stays_none() {
        assert_eq!(sanitize_opt(None).unwrap(), None);
        assert_eq!(sanitize_opt(Some("Bob")).unwrap().as_deref(), Some("bob"));
    }

    proptest! {
        #[test]
        fn output_is_bounded_and_starts_legally(raw in "\\PC{0,80}") {
            if let Ok(name) = sanitize(&raw) {
                prop_assert!(name.len() <= MAX_NAME_LEN);
                prop_assert!(starts_like_a_name(&name));
            }
        }

        #[test]
        fn valid_names_are_fixed_points(name in "[a-z_][-0-9_a-z]{0,31}") {
            prop_assert_eq!(sanitize(&name).unwrap(), name);
        }

        #[test]
        fn sanitizing_twice_is_stable(raw in "[ -~äöüßÄÖÜ]{0,40}") {
            let once = sanitize(&raw);
            prop_assume!(once.as_ref().is_ok_and(|name| !name.contains('.')));
            let once = once.unwrap();
            prop_assert_eq!(sanitize(&once).unwrap(), once);
        }
    }
}
