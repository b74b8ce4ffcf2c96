//! Importer core: contact schema, row validation and pure run accounting.
mod fields;
mod labels;
mod mapping;
mod msg;
mod outcome;
mod phone;
mod row;
mod state;
mod update;
mod value;
mod view_model;

pub use fields::{
    contact_field, required_fields, ContactField, FieldError, FieldKey, FieldKind, FieldValue,
    Formatter, Validator, CONTACT_FIELDS,
};
pub use labels::{is_valid_label, partition_labels, split_label_tokens, split_labels, LabelSplit};
pub use mapping::{auto_map, missing_required, FieldMapping, MappingTarget, UnknownTarget};
pub use msg::Msg;
pub use outcome::{ImportError, ImportErrorDetail, ImportErrorKind, RowOutcome, RowReport};
pub use phone::{clean_phone, format_phone, is_valid_phone, COUNTRY_CODES};
pub use row::{validate_and_format_row, FormattedContact, RowValidation};
pub use state::{ImportState, ImportSummary, SessionState};
pub use update::update;
pub use value::{is_blank, present, scalar_text, RawRow};
pub use view_model::{estimate_remaining, format_remaining, ProgressView};
