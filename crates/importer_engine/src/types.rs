use std::fmt;

use importer_core::{ImportErrorKind, ProgressView, RowReport};
use serde::{Deserialize, Serialize};

pub type AccountId = u64;
pub type InboxId = u64;
pub type ContactId = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    RowFinished(RowReport),
    Progress(ProgressView),
}

/// The three credential values issued at sign-in and sent on every call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub client: String,
    pub uid: String,
}

impl fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthTokens")
            .field("access_token", &"<redacted>")
            .field("client", &"<redacted>")
            .field("uid", &self.uid)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    pub name: String,
    pub email: String,
}

/// Everything a successful sign-in yields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginSession {
    pub tokens: AuthTokens,
    pub user: UserProfile,
    pub accounts: Vec<Account>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inbox {
    pub id: InboxId,
    pub name: String,
    #[serde(default)]
    pub channel_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedContact {
    pub id: ContactId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Business-level result of a create-contact call. Transport failures are
/// reported as [`ApiError`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateContactOutcome {
    Created(CreatedContact),
    Rejected {
        kind: ImportErrorKind,
        message: String,
    },
}

/// Labels newly associated with a contact. Empty when every label was
/// already present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelAttachment {
    pub added: Vec<String>,
}

impl LabelAttachment {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty()
    }
}

/// Account and inbox that receive the imported contacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportTarget {
    pub account_id: AccountId,
    pub inbox_id: InboxId,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    HttpStatus(u16),
    Timeout,
    Network,
    InvalidResponse,
    MissingAuthTokens,
    InvalidToken,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::InvalidResponse => write!(f, "invalid response"),
            FailureKind::MissingAuthTokens => write!(f, "missing authentication tokens"),
            FailureKind::InvalidToken => write!(f, "invalid authentication token"),
        }
    }
}
