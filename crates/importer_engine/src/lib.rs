//! Importer engine: remote API client, import runner and file IO.
mod client;
mod decode;
mod parse;
mod persist;
mod report;
mod runner;
mod types;

pub use client::{classify_rejection, login, ApiSettings, ContactApi, ReqwestContactApi};
pub use decode::{decode_text, DecodeError, DecodedText};
pub use parse::{parse_csv, parse_file, parse_json, ParseError, ParsedFile};
pub use persist::{ensure_dir, write_atomic, PersistError};
pub use report::{render_error_report, write_error_report, ReportError};
pub use runner::{
    process_row, run_import, ChannelProgressSink, ImportFile, ImportJob, ProgressSink,
    RunnerSettings,
};
pub use types::{
    Account, AccountId, ApiError, AuthTokens, ContactId, CreateContactOutcome, CreatedContact,
    EngineEvent, FailureKind, ImportTarget, Inbox, InboxId, LabelAttachment, LoginSession,
    UserProfile,
};
