use serde::{Deserialize, Serialize};

use crate::fields::{required_fields, ContactField, FieldKey, CONTACT_FIELDS};

const CUSTOM_TARGET: &str = "custom";

/// Where a source column ends up.
///
/// Serialized as the field key, `"custom"` or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Option<String>", into = "Option<String>")]
pub enum MappingTarget {
    Ignore,
    Field(FieldKey),
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mapping target `{0}`")]
pub struct UnknownTarget(pub String);

impl TryFrom<Option<String>> for MappingTarget {
    type Error = UnknownTarget;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        match value.as_deref() {
            None => Ok(MappingTarget::Ignore),
            Some(CUSTOM_TARGET) => Ok(MappingTarget::Custom),
            Some(key) => FieldKey::from_key(key)
                .map(MappingTarget::Field)
                .ok_or_else(|| UnknownTarget(key.to_string())),
        }
    }
}

impl From<MappingTarget> for Option<String> {
    fn from(target: MappingTarget) -> Self {
        match target {
            MappingTarget::Ignore => None,
            MappingTarget::Custom => Some(CUSTOM_TARGET.to_string()),
            MappingTarget::Field(key) => Some(key.as_str().to_string()),
        }
    }
}

/// One mapping per source column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source: String,
    pub target: MappingTarget,
}

impl FieldMapping {
    pub fn new(source: impl Into<String>, target: MappingTarget) -> Self {
        Self {
            source: source.into(),
            target,
        }
    }

    pub fn field(source: impl Into<String>, key: FieldKey) -> Self {
        Self::new(source, MappingTarget::Field(key))
    }
}

fn letters_only(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase())
        .collect()
}

fn guess_target(header: &str) -> MappingTarget {
    let normalized = letters_only(header);
    CONTACT_FIELDS
        .iter()
        .find(|field| normalized == field.key.as_str() || normalized == letters_only(field.label))
        .map_or(MappingTarget::Ignore, |field| MappingTarget::Field(field.key))
}

/// Proposes a mapping for each header. The first matching field wins and
/// unmatched columns are ignored.
pub fn auto_map<S: AsRef<str>>(headers: &[S]) -> Vec<FieldMapping> {
    headers
        .iter()
        .map(|header| FieldMapping::new(header.as_ref(), guess_target(header.as_ref())))
        .collect()
}

/// Required fields that no column maps to.
pub fn missing_required(mappings: &[FieldMapping]) -> Vec<&'static ContactField> {
    required_fields()
        .filter(|field| {
            !mappings
                .iter()
                .any(|mapping| mapping.target == MappingTarget::Field(field.key))
        })
        .collect()
}
