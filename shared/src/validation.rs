use std::collections::HashSet;
use crate::models::{AskQuestionRequest, EditQuestionRequest, PostAnswerRequest, ProfileFields, CreateUserRequest};

pub const MIN_TITLE_LENGTH: usize = 5;
pub const MAX_TITLE_LENGTH: usize = 130;
pub const MIN_CONTENT_LENGTH: usize = 20;
pub const MAX_CONTENT_LENGTH: usize = 20_000;
pub const MIN_TAGS: usize = 1;
pub const MAX_TAGS: usize = 3;
pub const MAX_TAG_LENGTH: usize = 15;
pub const MAX_NAME_LENGTH: usize = 50;
pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 30;
pub const MAX_BIO_LENGTH: usize = 150;
pub const MAX_LOCATION_LENGTH: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Title must be between {MIN_TITLE_LENGTH} and {MAX_TITLE_LENGTH} characters")]
    InvalidTitle,
    #[error("Content must be between {MIN_CONTENT_LENGTH} and {MAX_CONTENT_LENGTH} characters")]
    InvalidContent,
    #[error("Between {MIN_TAGS} and {MAX_TAGS} tags are required")]
    TagCount,
    #[error("Tag must be between 1 and {MAX_TAG_LENGTH} characters: {0}")]
    InvalidTag(String),
    #[error("Duplicate tag: {0}")]
    DuplicateTag(String),
    #[error("Name must be between 1 and {MAX_NAME_LENGTH} characters")]
    InvalidName,
    #[error("Username must be {MIN_USERNAME_LENGTH}-{MAX_USERNAME_LENGTH} characters of letters, digits or underscores")]
    InvalidUsername,
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Bio cannot exceed {MAX_BIO_LENGTH} characters")]
    BioTooLong,
    #[error("Location cannot exceed {MAX_LOCATION_LENGTH} characters")]
    LocationTooLong,
    #[error("Portfolio website must be an http(s) URL")]
    InvalidWebsite,
}

fn char_len(s: &str) -> usize {
    s.trim().chars().count()
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    let len = char_len(title);
    if !(MIN_TITLE_LENGTH..=MAX_TITLE_LENGTH).contains(&len) {
        return Err(ValidationError::InvalidTitle);
    }
    Ok(())
}

fn validate_content(content: &str) -> Result<(), ValidationError> {
    let len = char_len(content);
    if !(MIN_CONTENT_LENGTH..=MAX_CONTENT_LENGTH).contains(&len) {
        return Err(ValidationError::InvalidContent);
    }
    Ok(())
}

/// Trims and lowercases tags, rejecting empty, oversized and repeated names.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>, ValidationError> {
    if !(MIN_TAGS..=MAX_TAGS).contains(&tags.len()) {
        return Err(ValidationError::TagCount);
    }

    let mut seen = HashSet::with_capacity(tags.len());
    let mut normalized = Vec::with_capacity(tags.len());
    for tag in tags {
        let name = tag.trim().to_lowercase();
        let len = name.chars().count();
        if len == 0 || len > MAX_TAG_LENGTH || name.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidTag(tag.clone()));
        }
        if !seen.insert(name.clone()) {
            return Err(ValidationError::DuplicateTag(name));
        }
        normalized.push(name);
    }
    Ok(normalized)
}

/// Validates a new question and returns its normalised tag names.
pub fn validate_question(request: &AskQuestionRequest) -> Result<Vec<String>, ValidationError> {
    validate_title(&request.title)?;
    validate_content(&request.content)?;
    normalize_tags(&request.tags)
}

pub fn validate_question_edit(request: &EditQuestionRequest) -> Result<(), ValidationError> {
    validate_title(&request.title)?;
    validate_content(&request.content)
}

pub fn validate_answer(request: &PostAnswerRequest) -> Result<(), ValidationError> {
    validate_content(&request.content)
}

pub fn normalize_username(username: &str) -> Result<String, ValidationError> {
    let username = username.trim().to_lowercase();
    let len = username.chars().count();
    let allowed = username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !allowed || !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&len) {
        return Err(ValidationError::InvalidUsername);
    }
    Ok(username)
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace) => Ok(()),
        _ => Err(ValidationError::InvalidEmail),
    }
}

fn trim_optional(field: &mut Option<String>) {
    *field = field
        .take()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
}

/// Normalises the profile in place: text fields are trimmed and blank optional fields cleared.
pub fn validate_profile(profile: &mut ProfileFields) -> Result<(), ValidationError> {
    profile.name = profile.name.trim().to_string();
    let name_len = char_len(&profile.name);
    if name_len == 0 || name_len > MAX_NAME_LENGTH {
        return Err(ValidationError::InvalidName);
    }
    profile.username = normalize_username(&profile.username)?;

    trim_optional(&mut profile.bio);
    trim_optional(&mut profile.location);
    trim_optional(&mut profile.portfolio_website);

    if profile.bio.as_deref().map_or(false, |b| char_len(b) > MAX_BIO_LENGTH) {
        return Err(ValidationError::BioTooLong);
    }
    if profile.location.as_deref().map_or(false, |l| char_len(l) > MAX_LOCATION_LENGTH) {
        return Err(ValidationError::LocationTooLong);
    }
    if let Some(site) = profile.portfolio_website.as_deref() {
        if !(site.starts_with("http://") || site.starts_with("https://")) {
            return Err(ValidationError::InvalidWebsite);
        }
    }
    Ok(())
}

pub fn validate_new_user(request: &mut CreateUserRequest) -> Result<(), ValidationError> {
    validate_profile(&mut request.profile)?;
    validate_email(&request.email)?;
    request.email = request.email.trim().to_lowercase();
    Ok(())
}
