//! Component name normalization.
//!
//! Components may be registered as `foo-bar`, `FooBar` or `fooBar` and
//! referenced under any of those spellings. Every lookup in the crate goes
//! through [`canonical_key`] so the convention used never matters.
//!
//! Stub tags are derived separately by [`stub_tag`]. Two different names that
//! collapse to the same key (`fooBar` and `foo-bar`) also share a stub tag.

use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Suffix appended to the hyphenated component name of an auto-generated stub
pub const STUB_SUFFIX: &str = "-stub";

fn camelize_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-(\w)").expect("camelize pattern is valid"))
}

fn hyphenate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\B([A-Z])").expect("hyphenate pattern is valid"))
}

/// `foo-bar` -> `fooBar`
#[must_use]
pub fn camelize(name: &str) -> String {
    camelize_re()
        .replace_all(name, |caps: &Captures<'_>| caps[1].to_uppercase())
        .into_owned()
}

/// `fooBar` -> `FooBar`
#[must_use]
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `foo-bar` / `fooBar` -> `FooBar`
#[must_use]
pub fn pascal_case(name: &str) -> String {
    capitalize(&camelize(name))
}

/// `FooBar` / `fooBar` -> `foo-bar`
#[must_use]
pub fn hyphenate(name: &str) -> String {
    hyphenate_re()
        .replace_all(name, "-$1")
        .to_lowercase()
}

/// Convention-independent comparison key.
///
/// Kebab, Pascal and camel spellings of one logical name produce the same
/// key, and `canonical_key(canonical_key(x)) == canonical_key(x)`.
#[must_use]
pub fn canonical_key(name: &str) -> String {
    hyphenate(&camelize(name))
}

/// True when both names refer to the same logical component
#[must_use]
pub fn names_match(a: &str, b: &str) -> bool {
    a == b || canonical_key(a) == canonical_key(b)
}

/// Tag rendered by an auto-generated stub: `FooBar` -> `foo-bar-stub`
#[must_use]
pub fn stub_tag(name: &str) -> String {
    let mut tag = hyphenate(name);
    tag.push_str(STUB_SUFFIX);
    tag
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn camelize_hyphenated_name() {
        assert_eq!(camelize("foo-bar"), "fooBar");
        assert_eq!(camelize("component-with-slots"), "componentWithSlots");
        assert_eq!(camelize("plain"), "plain");
    }

    #[test]
    fn capitalize_handles_empty() {
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("foo"), "Foo");
    }

    #[test]
    fn pascal_case_from_every_convention() {
        assert_eq!(pascal_case("foo-bar"), "FooBar");
        assert_eq!(pascal_case("fooBar"), "FooBar");
        assert_eq!(pascal_case("FooBar"), "FooBar");
    }

    #[test]
    fn hyphenate_only_splits_inside_words() {
        assert_eq!(hyphenate("FooBar"), "foo-bar");
        assert_eq!(hyphenate("fooBar"), "foo-bar");
        assert_eq!(hyphenate("foo-bar"), "foo-bar");
        assert_eq!(hyphenate("Foo"), "foo");
    }

    #[test]
    fn canonical_key_equates_conventions() {
        let key = canonical_key("ComponentWithSlots");
        assert_eq!(key, "component-with-slots");
        assert_eq!(canonical_key("componentWithSlots"), key);
        assert_eq!(canonical_key("component-with-slots"), key);
    }

    #[test]
    fn names_match_is_convention_independent() {
        assert!(names_match("foo-bar", "FooBar"));
        assert!(names_match("fooBar", "foo-bar"));
        assert!(!names_match("foo", "foo-bar"));
    }

    #[test]
    fn stub_tag_is_kebab_with_suffix() {
        assert_eq!(stub_tag("FunctionalFoo"), "functional-foo-stub");
        assert_eq!(stub_tag("foo-bar"), "foo-bar-stub");
        assert_eq!(stub_tag("fooBar"), "foo-bar-stub");
    }

    #[test]
    fn colliding_names_share_a_tag() {
        assert_eq!(stub_tag("fooBar"), stub_tag("FooBar"));
    }

    fn words() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-z][a-z0-9]{0,6}", 1..4)
    }

    proptest! {
        #[test]
        fn prop_three_spellings_share_key(parts in words()) {
            let kebab = parts.join("-");
            let pascal: String = parts.iter().map(|p| capitalize(p)).collect();
            let camel = {
                let mut out = parts[0].clone();
                for p in &parts[1..] {
                    out.push_str(&capitalize(p));
                }
                out
            };

            let key = canonical_key(&kebab);
            prop_assert_eq!(&canonical_key(&pascal), &key);
            prop_assert_eq!(&canonical_key(&camel), &key);
        }

        #[test]
        fn prop_canonical_key_is_idempotent(name in "[a-zA-Z][a-zA-Z0-9-]{0,12}") {
            let once = canonical_key(&name);
            prop_assert_eq!(canonical_key(&once), once.clone());
        }
    }
}
