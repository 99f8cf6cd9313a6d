// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Blog post validator.
//!
//! Implements the checks applied before a post is handed to the backend:
//! - Title presence and length bounds
//! - Content presence and length bounds
//! - HTML escaping of the submitted text
//!
//! Lengths are counted in characters, not bytes.

use crate::config::ValidationConfig;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Title is required")]
    TitleRequired,

    #[error("Title must be at least {min} characters")]
    TitleTooShort { min: usize },

    #[error("Title cannot exceed {max} characters")]
    TitleTooLong { max: usize },

    #[error("Content is required")]
    ContentRequired,

    #[error("Content must be at least {min} characters")]
    ContentTooShort { min: usize },

    #[error("Content cannot exceed {max} characters")]
    ContentTooLong { max: usize },
}

/// Result of validating a whole post.
#[derive(Debug, Clone)]
pub struct PostValidation {
    pub errors: Vec<ValidationError>,
    /// Trimmed, HTML-escaped title
    pub sanitized_title: String,
    /// Trimmed, HTML-escaped content
    pub sanitized_content: String,
}

impl PostValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Error messages in the order they were found.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// How close a field is to its length limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterLevel {
    Normal,
    /// Above 75% of the limit
    Warning,
    /// Above 90% of the limit
    Critical,
}

/// Character counter shown next to an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CharacterCount {
    pub current: usize,
    pub max: usize,
    pub level: CounterLevel,
}

impl fmt::Display for CharacterCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.current, self.max)
    }
}

/// Count the characters of `text` against `max`.
pub fn character_count(text: &str, max: usize) -> CharacterCount {
    let current = text.chars().count();
    // Integer form of current > max * 0.9 and current > max * 0.75
    let level = if current * 10 > max * 9 {
        CounterLevel::Critical
    } else if current * 4 > max * 3 {
        CounterLevel::Warning
    } else {
        CounterLevel::Normal
    };
    CharacterCount {
        current,
        max,
        level,
    }
}

/// Escape text so it renders literally inside HTML.
pub fn sanitize_input(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
    out
}

/// Blog post validator.
#[derive(Debug, Clone)]
pub struct PostValidator {
    config: ValidationConfig,
}

impl PostValidator {
    /// Create a new validator with the given configuration.
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate a post title. Every failed rule is reported.
    pub fn validate_title(&self, title: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let trimmed_len = title.trim().chars().count();

        if trimmed_len == 0 {
            errors.push(ValidationError::TitleRequired);
        }
        if trimmed_len < self.config.title_min_length {
            errors.push(ValidationError::TitleTooShort {
                min: self.config.title_min_length,
            });
        }
        if title.chars().count() > self.config.title_max_length {
            errors.push(ValidationError::TitleTooLong {
                max: self.config.title_max_length,
            });
        }
        errors
    }

    /// Validate post content. Every failed rule is reported.
    pub fn validate_content(&self, content: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let trimmed_len = content.trim().chars().count();

        if trimmed_len == 0 {
            errors.push(ValidationError::ContentRequired);
        }
        if trimmed_len < self.config.content_min_length {
            errors.push(ValidationError::ContentTooShort {
                min: self.config.content_min_length,
            });
        }
        if content.chars().count() > self.config.content_max_length {
            errors.push(ValidationError::ContentTooLong {
                max: self.config.content_max_length,
            });
        }
        errors
    }

    /// Validate both fields and produce the escaped values to store.
    pub fn validate_post(&self, title: &str, content: &str) -> PostValidation {
        let mut errors = self.validate_title(title);
        errors.extend(self.validate_content(content));

        if !errors.is_empty() {
            debug!(errors = errors.len(), "Post failed validation");
        }

        PostValidation {
            errors,
            sanitized_title: sanitize_input(title.trim()),
            sanitized_content: sanitize_input(content.trim()),
        }
    }

    pub fn title_counter(&self, title: &str) -> CharacterCount {
        character_count(title, self.config.title_max_length)
    }

    pub fn content_counter(&self, content: &str) -> CharacterCount {
        character_count(content, self.config.content_max_length)
    }
}

impl Default for PostValidator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_escapes_markup() {
        assert_eq!(
            sanitize_input("<script>alert(\"x\")</script> & co"),
            "&lt;script&gt;alert(\"x\")&lt;/script&gt; &amp; co"
        );
        assert_eq!(sanitize_input("a\u{a0}b"), "a&nbsp;b");
        assert_eq!(sanitize_input("plain 'text'"), "plain 'text'");
    }

    #[test]
    fn test_empty_title_reports_required_and_short() {
        let validator = PostValidator::default();

        let errors = validator.validate_title("   ");
        assert_eq!(
            errors,
            vec![
                ValidationError::TitleRequired,
                ValidationError::TitleTooShort { min: 3 }
            ]
        );
    }

    #[test]
    fn test_title_length_bounds() {
        let validator = PostValidator::default();

        assert!(validator.validate_title("Hey").is_empty());
        assert!(validator.validate_title(&"t".repeat(200)).is_empty());
        assert_eq!(
            validator.validate_title(&"t".repeat(201)),
            vec![ValidationError::TitleTooLong { max: 200 }]
        );
        // Untrimmed length counts towards the maximum
        let padded = format!("{}  ", "t".repeat(199));
        assert_eq!(
            validator.validate_title(&padded),
            vec![ValidationError::TitleTooLong { max: 200 }]
        );
    }

    #[test]
    fn test_lengths_count_characters() {
        let validator = PostValidator::default();
        // Three characters, nine bytes
        assert!(validator.validate_title("日本語").is_empty());
    }

    #[test]
    fn test_content_too_short() {
        let validator = PostValidator::default();

        let errors = validator.validate_content("  short  ");
        assert_eq!(errors, vec![ValidationError::ContentTooShort { min: 10 }]);
        assert_eq!(errors[0].to_string(), "Content must be at least 10 characters");
    }

    #[test]
    fn test_validate_post_collects_errors_and_sanitizes() {
        let validator = PostValidator::default();

        let result = validator.validate_post("  <b>Hi</b>  ", "");
        assert!(!result.is_valid());
        assert_eq!(
            result.messages(),
            vec![
                "Content is required".to_string(),
                "Content must be at least 10 characters".to_string()
            ]
        );
        assert_eq!(result.sanitized_title, "&lt;b&gt;Hi&lt;/b&gt;");
        assert_eq!(result.sanitized_content, "");
    }

    #[test]
    fn test_character_count_levels() {
        assert_eq!(character_count("", 200).level, CounterLevel::Normal);
        assert_eq!(character_count(&"a".repeat(150), 200).level, CounterLevel::Normal);
        assert_eq!(character_count(&"a".repeat(151), 200).level, CounterLevel::Warning);
        assert_eq!(character_count(&"a".repeat(180), 200).level, CounterLevel::Warning);
        assert_eq!(character_count(&"a".repeat(181), 200).level, CounterLevel::Critical);
        assert_eq!(character_count("abc", 200).to_string(), "3 / 200");
    }
}
