//! The name mapping of adapter release 0.4.4.
//!
//! Release 0.4.4 shortened overlong names differently and stripped a `-`
//! following a prepended underscore. Groups it created may still exist under
//! those names; the mapping is retained verbatim so they can be located and
//! renamed. Do not use it for new names.

use crate::sanitize::{normalize, starts_like_a_name, MAX_NAME_LEN};

/// Maps a label the way release 0.4.4 did.
///
/// Overlong names are shortened fragment by fragment (fragments are split on
/// `_`), starting with the first. Fragments of three characters or less are
/// left alone, every shortened fragment keeps its first character and gets a
/// `..` suffix. Returns `None` if the name is still too long afterwards.
#[must_use]
pub fn sanitize_legacy(raw: &str) -> Option<String> {
    let mut word = normalize(raw);

    if !starts_like_a_name(&word) {
        word = format!("_{word}");
    }
    if word.starts_with("_-") {
        word = format!("_{}", &word[2..]);
    }

    if word.len() <= MAX_NAME_LEN {
        return Some(word);
    }

    let mut excess = word.len() - MAX_NAME_LEN;
    let mut fragments: Vec<String> = word.split('_').map(str::to_string).collect();

    for fragment in &mut fragments {
        if fragment.len() <= 3 {
            continue;
        }
        if excess == 0 {
            break;
        }
        excess += 2;

        for _ in 0..fragment.len() - 1 {
            fragment.pop();
            excess -= 1;
            if excess == 0 {
                break;
            }
        }
        fragment.push_str("..");
    }

    (excess == 0).then(|| fragments.join("_"))
}
