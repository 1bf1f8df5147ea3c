//! Word inflection for derived names
//!
//! Default association ids and counter-cache column names are derived from
//! model names: a has-many association defaults to the pluralized target
//! model, and the default counter column is the pluralized owner model plus
//! `_count`. Only the English rules the naming conventions rely on are
//! implemented.

/// Pluralizes a lowercase model name.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }

    if let Some(stem) = word.strip_suffix('y') {
        if !stem.is_empty() && !ends_with_vowel(stem) {
            return format!("{}ies", stem);
        }
    }

    if word.ends_with('s')
        || word.ends_with('x')
        || word.ends_with('z')
        || word.ends_with("ch")
        || word.ends_with("sh")
    {
        return format!("{}es", word);
    }

    format!("{}s", word)
}

/// Singularizes a lowercase association id back to a model name.
pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{}y", stem);
        }
    }

    for suffix in ["ches", "shes", "sses", "xes", "zes"] {
        if let Some(stem) = word.strip_suffix("es") {
            if word.ends_with(suffix) {
                return stem.to_string();
            }
        }
    }

    if let Some(stem) = word.strip_suffix('s') {
        if !stem.is_empty() {
            return stem.to_string();
        }
    }

    word.to_string()
}

fn ends_with_vowel(s: &str) -> bool {
    matches!(s.chars().last(), Some('a' | 'e' | 'i' | 'o' | 'u'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pluralize_common_forms() {
        assert_eq!(pluralize("post"), "posts");
        assert_eq!(pluralize("comment"), "comments");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("address"), "addresses");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("day"), "days");
    }

    #[test]
    fn singularize_reverses_pluralize() {
        for word in ["post", "comment", "category", "address", "box", "day"] {
            assert_eq!(singularize(&pluralize(word)), word);
        }
    }
}
