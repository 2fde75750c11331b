//! Schema validation for the WhatsApp command surface.
//!
//! Every command is checked in full before any network call or database
//! write; violations are accumulated so the caller sees all offending
//! fields at once.

use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Required(String),
    TooShort {
        field: String,
        min: usize,
        actual: usize,
    },
    TooLong {
        field: String,
        max: usize,
        actual: usize,
    },
    InvalidRange {
        field: String,
        min: String,
        max: String,
    },
    InvalidValue {
        field: String,
        message: String,
    },
    InvalidUrl(String),
    InvalidUuid(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Required(field) => write!(f, "Field '{}' is required", field),
            Self::TooShort { field, min, actual } => {
                write!(f, "Field '{}' is too short: {} < {} chars", field, actual, min)
            }
            Self::TooLong { field, max, actual } => {
                write!(f, "Field '{}' is too long: {} > {} chars", field, actual, max)
            }
            Self::InvalidRange { field, min, max } => {
                write!(f, "Field '{}' must have between {} and {} entries", field, min, max)
            }
            Self::InvalidValue { field, message } => {
                write!(f, "Field '{}' has invalid value: {}", field, message)
            }
            Self::InvalidUrl(url) => write!(f, "Invalid URL: {}", url),
            Self::InvalidUuid(uuid) => write!(f, "Invalid UUID: {}", uuid),
        }
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Default)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn check(&mut self, result: Result<(), ValidationError>) {
        if let Err(e) = result {
            self.errors.push(e);
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }
}

static UUID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("Invalid UUID regex")
});

static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://[a-zA-Z0-9][-a-zA-Z0-9]*(\.[a-zA-Z0-9][-a-zA-Z0-9]*)*(:\d+)?(/[-a-zA-Z0-9()@:%_\+.~#?&/=]*)?$",
    )
    .expect("Invalid URL regex")
});

static SESSION_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_-]{3,50}$").expect("Invalid session name regex"));

pub const MAX_MESSAGE_LENGTH: usize = 4096;
pub const MAX_BULK_LEADS: usize = 100;

const MESSAGE_TYPES: &[&str] = &["text", "image", "document"];

pub fn validate_uuid(value: &str) -> Result<(), ValidationError> {
    if UUID_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidUuid(value.to_string()))
    }
}

pub fn validate_url(url: &str) -> Result<(), ValidationError> {
    if url.len() <= 2048 && URL_REGEX.is_match(url) {
        Ok(())
    } else {
        Err(ValidationError::InvalidUrl(url.to_string()))
    }
}

pub fn validate_length(
    value: &str,
    field_name: &str,
    min: usize,
    max: usize,
) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len < min {
        return Err(ValidationError::TooShort {
            field: field_name.to_string(),
            min,
            actual: len,
        });
    }
    if len > max {
        return Err(ValidationError::TooLong {
            field: field_name.to_string(),
            max,
            actual: len,
        });
    }
    Ok(())
}

/// Send-one command: ids UUID-shaped, message 1-4096 chars, known message
/// type, media URL syntactically valid and required for media types.
pub fn validate_send(
    campaign_id: &str,
    lead_id: &str,
    conversation_id: Option<&str>,
    message: &str,
    message_type: &str,
    media_url: Option<&str>,
) -> ValidationResult {
    let mut result = ValidationResult::new();
    result.check(validate_uuid(campaign_id));
    result.check(validate_uuid(lead_id));
    if let Some(conv) = conversation_id {
        result.check(validate_uuid(conv));
    }
    result.check(validate_length(message, "message", 1, MAX_MESSAGE_LENGTH));
    if !MESSAGE_TYPES.contains(&message_type) {
        result.add_error(ValidationError::InvalidValue {
            field: "message_type".to_string(),
            message: format!("'{}' is not one of text, image, document", message_type),
        });
    }
    match media_url {
        Some(url) => result.check(validate_url(url)),
        None if message_type != "text" && MESSAGE_TYPES.contains(&message_type) => {
            result.add_error(ValidationError::Required("media_url".to_string()));
        }
        None => {}
    }
    result
}

/// Bulk-send command: template id UUID-shaped, 1-100 lead ids, each
/// UUID-shaped.
pub fn validate_bulk(template_id: &str, lead_ids: &[String]) -> ValidationResult {
    let mut result = ValidationResult::new();
    result.check(validate_uuid(template_id));
    if lead_ids.is_empty() || lead_ids.len() > MAX_BULK_LEADS {
        result.add_error(ValidationError::InvalidRange {
            field: "lead_ids".to_string(),
            min: "1".to_string(),
            max: MAX_BULK_LEADS.to_string(),
        });
    }
    for lead_id in lead_ids {
        result.check(validate_uuid(lead_id));
    }
    result
}

/// Official-API credential payload, validated before the settings UI is
/// allowed to persist it.
pub fn validate_official_config(
    business_account_id: &str,
    phone_number_id: &str,
    access_token: &str,
    webhook_verify_token: &str,
) -> ValidationResult {
    let mut result = ValidationResult::new();
    result.check(validate_length(business_account_id, "business_account_id", 1, 100));
    result.check(validate_length(phone_number_id, "phone_number_id", 1, 100));
    result.check(validate_length(access_token, "access_token", 10, 500));
    result.check(validate_length(webhook_verify_token, "webhook_verify_token", 5, 100));
    result
}

/// Bridge credential payload: lowercase session slug plus an http(s)
/// bridge endpoint.
pub fn validate_unofficial_config(session_name: &str, webhook_url: &str) -> ValidationResult {
    let mut result = ValidationResult::new();
    if !SESSION_NAME_REGEX.is_match(session_name) {
        result.add_error(ValidationError::InvalidValue {
            field: "session_name".to_string(),
            message: "must be 3-50 chars of lowercase letters, digits, '-' or '_'".to_string(),
        });
    }
    result.check(validate_url(webhook_url));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const CID: &str = "0b2f64f0-3c11-4a5e-9d57-2a4f5a3c9e01";
    const LID: &str = "7f9d2b44-88aa-4f0e-b7cb-63d2f3a0c912";

    #[test]
    fn test_valid_send_command() {
        let result = validate_send(CID, LID, None, "Hello", "text", None);
        assert!(result.is_valid(), "{:?}", result.errors());
    }

    #[test]
    fn test_send_rejects_empty_message() {
        let result = validate_send(CID, LID, None, "", "text", None);
        assert!(!result.is_valid());
        assert!(matches!(
            result.errors()[0],
            ValidationError::TooShort { .. }
        ));
    }

    #[test]
    fn test_send_rejects_oversized_message() {
        let long = "a".repeat(MAX_MESSAGE_LENGTH + 1);
        let result = validate_send(CID, LID, None, &long, "text", None);
        assert!(!result.is_valid());
    }

    #[test]
    fn test_send_accepts_message_at_limit() {
        let body = "a".repeat(MAX_MESSAGE_LENGTH);
        let result = validate_send(CID, LID, None, &body, "text", None);
        assert!(result.is_valid());
    }

    #[test]
    fn test_send_rejects_malformed_ids() {
        let result = validate_send("not-a-uuid", LID, Some("also-bad"), "hi", "text", None);
        assert_eq!(result.errors().len(), 2);
    }

    #[test]
    fn test_send_rejects_unknown_type() {
        let result = validate_send(CID, LID, None, "hi", "audio", None);
        assert!(!result.is_valid());
    }

    #[test]
    fn test_send_media_requires_url() {
        let result = validate_send(CID, LID, None, "caption", "image", None);
        assert!(!result.is_valid());
        assert!(matches!(result.errors()[0], ValidationError::Required(_)));

        let ok = validate_send(
            CID,
            LID,
            None,
            "caption",
            "image",
            Some("https://cdn.example.com/a.png"),
        );
        assert!(ok.is_valid());
    }

    #[test]
    fn test_send_rejects_bad_media_url() {
        let result = validate_send(CID, LID, None, "hi", "text", Some("ftp://nope"));
        assert!(!result.is_valid());
    }

    #[test]
    fn test_send_reports_all_violations_at_once() {
        let result = validate_send("bad", "worse", None, "", "carrier-pigeon", None);
        assert_eq!(result.errors().len(), 4);
    }

    #[test]
    fn test_bulk_accepts_valid_list() {
        let leads: Vec<String> = (0..3).map(|_| uuid::Uuid::new_v4().to_string()).collect();
        assert!(validate_bulk(CID, &leads).is_valid());
    }

    #[test]
    fn test_bulk_rejects_empty_and_oversized_lists() {
        assert!(!validate_bulk(CID, &[]).is_valid());
        let too_many: Vec<String> = (0..101).map(|_| uuid::Uuid::new_v4().to_string()).collect();
        assert!(!validate_bulk(CID, &too_many).is_valid());
    }

    #[test]
    fn test_bulk_rejects_malformed_entry() {
        let leads = vec![LID.to_string(), "nope".to_string()];
        let result = validate_bulk(CID, &leads);
        assert!(!result.is_valid());
    }

    #[test]
    fn test_official_config_bounds() {
        assert!(validate_official_config("123", "456", "token-longer-than-10", "verify").is_valid());
        assert!(!validate_official_config("", "456", "token-longer-than-10", "verify").is_valid());
        assert!(!validate_official_config("123", "456", "short", "verify").is_valid());
        assert!(!validate_official_config("123", "456", "token-longer-than-10", "vrfy").is_valid());
    }

    #[test]
    fn test_unofficial_config() {
        assert!(validate_unofficial_config("my-session_01", "https://bridge.example.com/send").is_valid());
        assert!(!validate_unofficial_config("ab", "https://bridge.example.com").is_valid());
        assert!(!validate_unofficial_config("My-Session", "https://bridge.example.com").is_valid());
        assert!(!validate_unofficial_config("session", "not-a-url").is_valid());
    }
}
