//! The fixed contact schema: which target fields exist and how a raw cell is
//! validated and normalized for each of them.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::labels::split_label_tokens;
use crate::phone::{format_phone, is_valid_phone};
use crate::value::{is_blank, scalar_text};

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

/// Failure raised by a field formatter. The message is shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct FieldError {
    message: String,
}

impl FieldError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    Name,
    Email,
    PhoneNumber,
    AvatarUrl,
    Identifier,
    Labels,
}

impl FieldKey {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKey::Name => "name",
            FieldKey::Email => "email",
            FieldKey::PhoneNumber => "phone_number",
            FieldKey::AvatarUrl => "avatar_url",
            FieldKey::Identifier => "identifier",
            FieldKey::Labels => "labels",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        CONTACT_FIELDS
            .iter()
            .map(|field| field.key)
            .find(|candidate| candidate.as_str() == key)
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Email,
    Phone,
    Url,
    Labels,
}

/// Normalized value produced by a formatter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

pub type Validator = fn(&Value) -> bool;
pub type Formatter = fn(&Value) -> Result<FieldValue, FieldError>;

#[derive(Clone, Copy)]
pub struct ContactField {
    pub key: FieldKey,
    pub label: &'static str,
    pub required: bool,
    pub kind: FieldKind,
    pub validate: Option<Validator>,
    pub format: Option<Formatter>,
}

impl ContactField {
    /// Fields without a validator accept every value.
    pub fn is_valid(&self, value: &Value) -> bool {
        self.validate.map_or(true, |validate| validate(value))
    }

    /// Fields without a formatter pass the cell through as text.
    pub fn format(&self, value: &Value) -> Result<FieldValue, FieldError> {
        match self.format {
            Some(format) => format(value),
            None => Ok(FieldValue::Text(scalar_text(value))),
        }
    }
}

impl fmt::Debug for ContactField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContactField")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("required", &self.required)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Ordered target schema. Keys are unique.
pub static CONTACT_FIELDS: [ContactField; 6] = [
    ContactField {
        key: FieldKey::Name,
        label: "Name",
        required: true,
        kind: FieldKind::Text,
        validate: None,
        format: Some(format_name),
    },
    ContactField {
        key: FieldKey::Email,
        label: "Email",
        required: false,
        kind: FieldKind::Email,
        validate: Some(validate_email),
        format: Some(format_email),
    },
    ContactField {
        key: FieldKey::PhoneNumber,
        label: "Phone Number",
        required: false,
        kind: FieldKind::Phone,
        validate: Some(validate_phone),
        format: Some(format_phone_value),
    },
    ContactField {
        key: FieldKey::AvatarUrl,
        label: "Avatar URL",
        required: false,
        kind: FieldKind::Url,
        validate: Some(validate_url),
        format: None,
    },
    ContactField {
        key: FieldKey::Identifier,
        label: "External ID",
        required: false,
        kind: FieldKind::Text,
        validate: None,
        format: None,
    },
    ContactField {
        key: FieldKey::Labels,
        label: "Labels",
        required: false,
        kind: FieldKind::Labels,
        validate: None,
        format: Some(format_labels),
    },
];

pub fn contact_field(key: FieldKey) -> Option<&'static ContactField> {
    CONTACT_FIELDS.iter().find(|field| field.key == key)
}

pub fn required_fields() -> impl Iterator<Item = &'static ContactField> {
    CONTACT_FIELDS.iter().filter(|field| field.required)
}

fn format_name(value: &Value) -> Result<FieldValue, FieldError> {
    Ok(FieldValue::Text(scalar_text(value).trim().to_string()))
}

fn validate_email(value: &Value) -> bool {
    is_blank(value) || EMAIL_PATTERN.is_match(&scalar_text(value))
}

fn format_email(value: &Value) -> Result<FieldValue, FieldError> {
    Ok(FieldValue::Text(scalar_text(value).to_lowercase().trim().to_string()))
}

fn validate_phone(value: &Value) -> bool {
    is_blank(value) || is_valid_phone(&scalar_text(value))
}

fn format_phone_value(value: &Value) -> Result<FieldValue, FieldError> {
    format_phone(&scalar_text(value)).map(FieldValue::Text)
}

fn validate_url(value: &Value) -> bool {
    is_blank(value) || url::Url::parse(&scalar_text(value)).is_ok()
}

fn format_labels(value: &Value) -> Result<FieldValue, FieldError> {
    let raw = match value {
        // JSON sources may already carry a list of labels.
        Value::Array(items) => items.iter().map(scalar_text).collect::<Vec<_>>().join(","),
        other => scalar_text(other),
    };
    Ok(FieldValue::List(split_label_tokens(&raw)))
}

#[cfg(test)]
mod tests {
    use super::{contact_field, FieldKey, FieldValue, CONTACT_FIELDS};
    use serde_json::json;

    #[test]
    fn keys_are_unique_and_round_trip() {
        for field in &CONTACT_FIELDS {
            assert_eq!(FieldKey::from_key(field.key.as_str()), Some(field.key));
        }
        assert_eq!(FieldKey::from_key("custom"), None);
    }

    #[test]
    fn email_is_lowercased_and_trimmed() {
        let email = contact_field(FieldKey::Email).unwrap();
        assert!(email.is_valid(&json!("Jane.Doe@Example.COM")));
        assert!(!email.is_valid(&json!("jane@example")));
        assert!(email.is_valid(&json!("")));
        assert_eq!(
            email.format(&json!("Jane.Doe@Example.COM")).unwrap(),
            FieldValue::Text("jane.doe@example.com".into())
        );
    }

    #[test]
    fn avatar_requires_absolute_url() {
        let avatar = contact_field(FieldKey::AvatarUrl).unwrap();
        assert!(avatar.is_valid(&json!("https://cdn.example.com/a.png")));
        assert!(!avatar.is_valid(&json!("/images/a.png")));
        assert_eq!(
            avatar.format(&json!("https://cdn.example.com/a.png")).unwrap(),
            FieldValue::Text("https://cdn.example.com/a.png".into())
        );
    }

    #[test]
    fn identifier_passes_numbers_through_as_text() {
        let identifier = contact_field(FieldKey::Identifier).unwrap();
        assert_eq!(
            identifier.format(&json!(1042)).unwrap(),
            FieldValue::Text("1042".into())
        );
    }

    #[test]
    fn labels_split_on_commas() {
        let labels = contact_field(FieldKey::Labels).unwrap();
        assert_eq!(
            labels.format(&json!(" vip, ,lead ,")).unwrap(),
            FieldValue::List(vec!["vip".into(), "lead".into()])
        );
        assert_eq!(
            labels.format(&json!(["a", "b"])).unwrap(),
            FieldValue::List(vec!["a".into(), "b".into()])
        );
    }
}
