use serde::Serialize;
use serde_json::{Map, Value};

use crate::fields::{contact_field, FieldKey, FieldValue};
use crate::mapping::{FieldMapping, MappingTarget};
use crate::value::{present, RawRow};

/// Contact attributes built from one row. Labels are not part of the
/// create-contact payload and are attached separately.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormattedContact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip)]
    pub labels: Option<Vec<String>>,
    pub custom_attributes: Map<String, Value>,
}

impl FormattedContact {
    fn assign(&mut self, key: FieldKey, value: FieldValue) {
        let text = |value: FieldValue| match value {
            FieldValue::Text(text) => text,
            FieldValue::List(items) => items.join(","),
        };
        match key {
            FieldKey::Name => self.name = Some(text(value)),
            FieldKey::Email => self.email = Some(text(value)),
            FieldKey::PhoneNumber => self.phone_number = Some(text(value)),
            FieldKey::AvatarUrl => self.avatar_url = Some(text(value)),
            FieldKey::Identifier => self.identifier = Some(text(value)),
            FieldKey::Labels => {
                let labels = match value {
                    FieldValue::List(items) => items,
                    FieldValue::Text(text) => vec![text],
                };
                self.labels = (!labels.is_empty()).then_some(labels);
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowValidation {
    pub errors: Vec<String>,
    pub formatted: FormattedContact,
}

impl RowValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Applies `mappings` to `row`.
///
/// Every failing field contributes one message; a failure never stops the
/// remaining mappings from being evaluated. A row that maps no fields at all
/// is still valid.
pub fn validate_and_format_row(row: &RawRow, mappings: &[FieldMapping]) -> RowValidation {
    let mut result = RowValidation::default();

    for mapping in mappings {
        let MappingTarget::Field(key) = mapping.target else {
            continue;
        };
        let Some(field) = contact_field(key) else {
            continue;
        };

        let Some(value) = present(row, &mapping.source) else {
            if field.required {
                result.errors.push(format!("{} is required", field.label));
            }
            continue;
        };

        if !field.is_valid(value) {
            result.errors.push(format!("{} is invalid", field.label));
            continue;
        }

        match field.format(value) {
            Ok(formatted) => result.formatted.assign(key, formatted),
            Err(err) => result.errors.push(err.message().to_string()),
        }
    }

    for mapping in mappings
        .iter()
        .filter(|mapping| mapping.target == MappingTarget::Custom)
    {
        match row.get(&mapping.source) {
            None | Some(Value::Null) => {}
            Some(value @ (Value::Array(_) | Value::Object(_))) => {
                result
                    .formatted
                    .custom_attributes
                    .insert(mapping.source.clone(), Value::String(value.to_string()));
            }
            Some(value) => {
                result
                    .formatted
                    .custom_attributes
                    .insert(mapping.source.clone(), value.clone());
            }
        }
    }

    result
}
