/// Internal name used when no mapping rule matches an external field:
/// the first character is upper-cased, the rest is left untouched.
pub fn default_internal_name(external_name: &str) -> String {
    let mut chars = external_name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalizes_first_character_only() {
        assert_eq!(default_internal_name("foo"), "Foo");
        assert_eq!(default_internal_name("fooBar"), "FooBar");
        assert_eq!(default_internal_name("foo_bar"), "Foo_bar");
    }

    #[test]
    fn test_leaves_already_capitalized_names() {
        assert_eq!(default_internal_name("Level"), "Level");
        assert_eq!(default_internal_name("ACTOR"), "ACTOR");
    }

    #[test]
    fn test_non_letter_first_character() {
        assert_eq!(default_internal_name("1st"), "1st");
        assert_eq!(default_internal_name("_id"), "_id");
    }

    #[test]
    fn test_empty_name_stays_empty() {
        assert_eq!(default_internal_name(""), "");
    }

    #[test]
    fn test_unicode_first_character() {
        assert_eq!(default_internal_name("ásaf"), "Ásaf");
    }
}
