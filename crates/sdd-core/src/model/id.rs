//! Work-item id generation.
//!
//! Ids are `<type>_<slug>` where the slug is the title lowercased with runs of
//! non-alphanumeric characters collapsed to `_`. A numeric suffix (`_2`, `_3`,
//! …) is appended when the id is taken.

use super::item::WorkItemType;

const MAX_SLUG_LEN: usize = 48;

/// Lowercase ASCII slug of `title`, at most 48 characters.
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_sep = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }
    // ASCII only, so byte truncation is safe.
    slug.truncate(MAX_SLUG_LEN);
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}

/// Generate an unused id for a new item. `taken` reports existing ids.
#[must_use]
pub fn generate_id(item_type: WorkItemType, title: &str, taken: impl Fn(&str) -> bool) -> String {
    let slug = slugify(title);
    let base = if slug.is_empty() {
        item_type.as_str().to_string()
    } else {
        format!("{}_{slug}", item_type.as_str())
    };

    if !taken(&base) {
        return base;
    }
    (2u32..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or(base)
}

/// `true` for ids of the form produced by [`generate_id`].
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn slug_collapses_punctuation() {
        assert_eq!(slugify("Add OAuth2 login!"), "add_oauth2_login");
        assert_eq!(slugify("  --Fix   the   bug--  "), "fix_the_bug");
        assert_eq!(slugify("Über café"), "ber_caf");
    }

    #[test]
    fn slug_is_bounded() {
        let long = "word ".repeat(40);
        assert!(slugify(&long).len() <= MAX_SLUG_LEN);
    }

    #[test]
    fn collisions_get_numeric_suffix() {
        let mut taken: HashSet<String> = HashSet::new();
        let first = generate_id(WorkItemType::Bug, "Crash on save", |c| taken.contains(c));
        assert_eq!(first, "bug_crash_on_save");
        taken.insert(first);
        let second = generate_id(WorkItemType::Bug, "Crash on save", |c| taken.contains(c));
        assert_eq!(second, "bug_crash_on_save_2");
        taken.insert(second);
        let third = generate_id(WorkItemType::Bug, "crash-on-save", |c| taken.contains(c));
        assert_eq!(third, "bug_crash_on_save_3");
    }

    #[test]
    fn empty_slug_falls_back_to_type() {
        assert_eq!(
            generate_id(WorkItemType::IntegrationTest, "???", |_| false),
            "integration_test"
        );
    }

    #[test]
    fn generated_ids_are_valid() {
        let id = generate_id(WorkItemType::Security, "Rotate API keys (Q3)", |_| false);
        assert!(is_valid_id(&id));
        assert!(!is_valid_id("Bad-Id"));
        assert!(!is_valid_id(""));
    }
}
