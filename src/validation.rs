//! Validation for login names, chat text and inbound frames.

use std::collections::HashSet;

/// Username validation errors with helpful messages
#[derive(Debug, thiserror::Error)]
pub enum UsernameError {
    #[error("Username is too short (minimum {min} characters)")]
    TooShort { min: usize },

    #[error("Username is too long (maximum {max} characters)")]
    TooLong { max: usize },

    #[error("Username cannot start or end with whitespace")]
    InvalidWhitespace,

    #[error("Username contains invalid characters: {chars}")]
    InvalidCharacters { chars: String },

    #[error("Username is a reserved name")]
    Reserved,
}

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Content too long (max {max_length} bytes)")]
    ContentTooLong { max_length: usize },

    #[error("Content is empty")]
    Empty,

    #[error("Frame exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },

    #[error("Invalid request format: {0}")]
    InvalidFormat(String),
}

/// Username validation rules configuration
#[derive(Debug, Clone)]
pub struct UsernameRules {
    pub min_length: usize,
    pub max_length: usize,
    pub allow_spaces: bool,
    pub allow_unicode: bool,
}

impl UsernameRules {
    /// Rules for login names. The lowercased name becomes part of the player id
    /// and of storage keys, so only ASCII letters, digits, `_`, `-` and `.` pass.
    pub fn login() -> Self {
        UsernameRules {
            min_length: 2,
            max_length: 24,
            allow_spaces: false,
            allow_unicode: false,
        }
    }

    /// Display names are shown, never used as keys.
    pub fn display() -> Self {
        UsernameRules {
            min_length: 1,
            max_length: 40,
            allow_spaces: true,
            allow_unicode: true,
        }
    }
}

fn reserved_names() -> HashSet<&'static str> {
    [
        "admin", "administrator", "root", "system", "operator", "server", "mentor",
        "guest", "anonymous", "null", "none", "player",
    ]
    .iter()
    .copied()
    .collect()
}

pub fn validate_username(username: &str, rules: &UsernameRules) -> Result<String, UsernameError> {
    let trimmed = username.trim();

    if trimmed.chars().count() < rules.min_length {
        return Err(UsernameError::TooShort { min: rules.min_length });
    }
    if trimmed.chars().count() > rules.max_length {
        return Err(UsernameError::TooLong { max: rules.max_length });
    }
    if trimmed != username {
        return Err(UsernameError::InvalidWhitespace);
    }
    if reserved_names().contains(trimmed.to_lowercase().as_str()) {
        return Err(UsernameError::Reserved);
    }

    let mut invalid: Vec<char> = trimmed
        .chars()
        .filter(|&ch| {
            let ok = if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || ch == '.' {
                true
            } else if ch == ' ' {
                rules.allow_spaces
            } else if ch.is_control() {
                false
            } else if !ch.is_ascii() {
                rules.allow_unicode
            } else {
                false
            };
            !ok
        })
        .collect();

    if !invalid.is_empty() {
        invalid.sort_unstable();
        invalid.dedup();
        let chars = invalid
            .iter()
            .map(|c| {
                if c.is_control() {
                    format!("\\u{{{:04x}}}", *c as u32)
                } else {
                    c.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        return Err(UsernameError::InvalidCharacters { chars });
    }

    Ok(trimmed.to_string())
}

pub fn validate_login_name(name: &str) -> Result<String, UsernameError> {
    validate_username(name, &UsernameRules::login())
}

pub fn validate_display_name(name: &str) -> Result<String, UsernameError> {
    validate_username(name, &UsernameRules::display())
}

/// Strip control characters (newlines and tabs survive) and enforce a byte cap.
pub fn sanitize_chat(content: &str, max_bytes: usize) -> Result<String, InputError> {
    if content.len() > max_bytes {
        return Err(InputError::ContentTooLong { max_length: max_bytes });
    }
    let sanitized: String = content
        .chars()
        .filter(|&c| !c.is_control() || c == '\n' || c == '\t')
        .collect();
    let trimmed = sanitized.trim();
    if trimmed.is_empty() {
        return Err(InputError::Empty);
    }
    Ok(trimmed.to_string())
}

/// Parse one JSON frame with a size limit.
pub fn parse_frame<T>(content: &str, max_bytes: usize) -> Result<T, InputError>
where
    T: serde::de::DeserializeOwned,
{
    if content.len() > max_bytes {
        return Err(InputError::FrameTooLarge { limit: max_bytes });
    }
    let normalized = content.trim_start_matches('\0').trim();
    serde_json::from_str(normalized).map_err(|e| InputError::InvalidFormat(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_names() {
        assert_eq!(validate_login_name("Alice_01").expect("valid"), "Alice_01");
        assert!(matches!(validate_login_name("a"), Err(UsernameError::TooShort { min: 2 })));
        assert!(matches!(validate_login_name(" bob"), Err(UsernameError::InvalidWhitespace)));
        assert!(matches!(validate_login_name("Admin"), Err(UsernameError::Reserved)));
        assert!(matches!(
            validate_login_name("bo:b"),
            Err(UsernameError::InvalidCharacters { .. })
        ));
        assert!(matches!(
            validate_login_name("jöran"),
            Err(UsernameError::InvalidCharacters { .. })
        ));
        assert!(validate_login_name(&"x".repeat(25)).is_err());
    }

    #[test]
    fn display_names_are_looser() {
        assert_eq!(validate_display_name("Jöran the Bold").expect("valid"), "Jöran the Bold");
        assert!(validate_display_name("tab\there").is_err());
    }

    #[test]
    fn chat_is_sanitized() {
        assert_eq!(sanitize_chat("  hi\u{7} there\n", 100).expect("ok"), "hi there");
        assert!(matches!(sanitize_chat("\u{1b}", 100), Err(InputError::Empty)));
        assert!(matches!(
            sanitize_chat(&"a".repeat(11), 10),
            Err(InputError::ContentTooLong { max_length: 10 })
        ));
    }

    #[test]
    fn frames_are_size_limited() {
        let value: serde_json::Value = parse_frame("\0{\"type\":\"status\"}", 64).expect("parse");
        assert_eq!(value["type"], "status");
        assert!(matches!(
            parse_frame::<serde_json::Value>(&"1".repeat(65), 64),
            Err(InputError::FrameTooLarge { limit: 64 })
        ));
        assert!(matches!(
            parse_frame::<serde_json::Value>("{not json", 64),
            Err(InputError::InvalidFormat(_))
        ));
    }
}
