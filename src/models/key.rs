//! Validation rules shared by entry keys and volume names.
//!
//! Both use the same ASCII charset and the same 255 character ceiling. Entry
//! keys additionally accept `/` as the path separator, and folder keys are
//! normalized to end with one before they are measured.

use crate::errors::ValidationError;

/// Maximum length of an entry key (after folder normalization) or volume name.
pub const MAX_KEY_LEN: usize = 255;

/// Path separator used by entry keys.
pub const SEPARATOR: char = '/';

/// Characters accepted in both keys and names, not counting the separator.
const fn is_allowed(c: char) -> bool {
    matches!(
        c,
        'A'..='Z'
            | 'a'..='z'
            | '0'..='9'
            | '!'
            | '@'
            | '#'
            | '$'
            | '%'
            | '^'
            | '&'
            | '('
            | ')'
            | '_'
            | '-'
            | '+'
            | '='
            | '['
            | ']'
            | '{'
            | '}'
            | ';'
            | '\''
            | ','
            | '.'
            | '~'
            | ' '
    )
}

fn check(value: &str, field: &'static str, allow_separator: bool) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len == 0 {
        return Err(ValidationError::TooShort { field });
    }
    if len > MAX_KEY_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_KEY_LEN,
        });
    }
    if !value
        .chars()
        .all(|c| is_allowed(c) || (allow_separator && c == SEPARATOR))
    {
        return Err(ValidationError::InvalidCharacters { field });
    }
    Ok(())
}

/// Validate an entry key, appending the trailing separator for folders.
///
/// Returns the normalized key on success.
pub fn validate_key(key: &str, is_folder: bool) -> Result<String, ValidationError> {
    let mut normalized = key.to_string();
    if is_folder && !normalized.ends_with(SEPARATOR) {
        normalized.push(SEPARATOR);
    }
    check(&normalized, "key", true)?;
    Ok(normalized)
}

/// Validate a volume name. Names never contain the separator.
pub fn validate_name(name: &str) -> Result<String, ValidationError> {
    check(name, "name", false)?;
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HOSTILE: [char; 9] = ['\\', ':', '*', '?', '"', '<', '>', '|', 'é'];

    #[test]
    fn folder_keys_gain_a_trailing_separator() {
        assert_eq!(validate_key("a/b", true).unwrap(), "a/b/");
        assert_eq!(validate_key("a/b/", true).unwrap(), "a/b/");
        assert_eq!(validate_key("a/b", false).unwrap(), "a/b");
    }

    #[test]
    fn length_is_measured_after_normalization() {
        let key = "x".repeat(MAX_KEY_LEN);
        assert!(validate_key(&key, false).is_ok());
        assert_eq!(
            validate_key(&key, true),
            Err(ValidationError::TooLong {
                field: "key",
                max: MAX_KEY_LEN
            })
        );
    }

    #[test]
    fn empty_values_are_too_short() {
        assert_eq!(
            validate_key("", false),
            Err(ValidationError::TooShort { field: "key" })
        );
        assert_eq!(
            validate_name(""),
            Err(ValidationError::TooShort { field: "name" })
        );
    }

    #[test]
    fn hostile_characters_are_rejected() {
        for c in HOSTILE {
            let key = format!("dir/file{}name.txt", c);
            assert_eq!(
                validate_key(&key, false),
                Err(ValidationError::InvalidCharacters { field: "key" }),
                "{key}"
            );
            assert_eq!(
                validate_name(&format!("vol{}", c)),
                Err(ValidationError::InvalidCharacters { field: "name" })
            );
        }
    }

    #[test]
    fn names_reject_the_separator() {
        assert_eq!(
            validate_name("a/b"),
            Err(ValidationError::InvalidCharacters { field: "name" })
        );
    }

    #[test]
    fn full_charset_is_accepted() {
        let key = "Az09!@#$%^&()_-+=[]{};',./~ ";
        assert_eq!(validate_key(key, false).unwrap(), key);
    }

    proptest! {
        #[test]
        fn allowed_charset_within_bounds_is_valid(
            key in "[A-Za-z0-9!@#$%^&()_+=\\[\\]{};',./~ -]{1,255}"
        ) {
            prop_assert_eq!(validate_key(&key, false).unwrap(), key);
        }

        #[test]
        fn any_hostile_character_is_rejected(
            prefix in "[a-z]{0,20}",
            suffix in "[a-z]{0,20}",
            idx in 0usize..HOSTILE.len()
        ) {
            let name = format!("{}{}{}", prefix, HOSTILE[idx], suffix);
            prop_assert_eq!(
                validate_name(&name),
                Err(ValidationError::InvalidCharacters { field: "name" })
            );
        }
    }
}
