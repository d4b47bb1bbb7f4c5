//! Input validation shared by the command types

use thiserror::Error;

/// Maximum length of free text (space descriptions, review comments)
pub const MAX_TEXT_LENGTH: usize = 2000;

/// Maximum length of names and emails
pub const MAX_NAME_LENGTH: usize = 255;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameValidationError {
    #[error("Name is required and cannot be empty")]
    Required,

    #[error("Name must be between 1 and {max_length} characters")]
    TooLong { max_length: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlValidationError {
    #[error("{field_name} must be an absolute http:// or https:// URL")]
    InvalidFormat { field_name: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TextValidationError {
    #[error("{field_name} must be at most {max_length} characters")]
    TooLong {
        field_name: String,
        max_length: usize,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("'{0}' is not a valid email address")]
pub struct EmailValidationError(pub String);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Rating must be between 1 and 5, got {0}")]
pub struct RatingValidationError(pub i32);

/// Non-blank and at most `max_length` characters
pub fn validate_name(name: &str, max_length: usize) -> Result<(), NameValidationError> {
    if name.trim().is_empty() {
        return Err(NameValidationError::Required);
    }
    if name.chars().count() > max_length {
        return Err(NameValidationError::TooLong { max_length });
    }
    Ok(())
}

/// Optional free text bounded in characters (matching the storage CHECK)
pub fn validate_text(
    text: Option<&str>,
    field_name: &str,
    max_length: usize,
) -> Result<(), TextValidationError> {
    match text {
        Some(text) if text.chars().count() > max_length => Err(TextValidationError::TooLong {
            field_name: field_name.to_string(),
            max_length,
        }),
        _ => Ok(()),
    }
}

/// Photos and other links are stored as opaque absolute URLs
pub fn validate_url(url: &str, field_name: &str) -> Result<(), UrlValidationError> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));

    match rest {
        Some(rest) if !rest.is_empty() && !rest.starts_with('/') && !url.contains(char::is_whitespace) => Ok(()),
        _ => Err(UrlValidationError::InvalidFormat {
            field_name: field_name.to_string(),
        }),
    }
}

/// A deliberately loose shape check: `local@domain.tld`
pub fn validate_email(email: &str) -> Result<(), EmailValidationError> {
    let invalid = || EmailValidationError(email.to_string());

    if email.chars().count() > MAX_NAME_LENGTH || email.contains(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && !tld.is_empty() => Ok(()),
        _ => Err(invalid()),
    }
}

pub fn validate_rating(rating: i32) -> Result<(), RatingValidationError> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(RatingValidationError(rating))
    }
}
