use std::collections::BTreeSet;
use std::time::Duration;

use importer_core::{FormattedContact, ImportErrorKind};
use importer_logging::{import_debug, import_info, import_warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::{Response, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    Account, AccountId, ApiError, AuthTokens, ContactId, CreateContactOutcome, CreatedContact,
    FailureKind, Inbox, InboxId, LabelAttachment, LoginSession, UserProfile,
};

const ACCESS_TOKEN_HEADER: &str = "access-token";
const CLIENT_HEADER: &str = "client";
const UID_HEADER: &str = "uid";

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ApiSettings {
    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn client_builder(&self) -> reqwest::ClientBuilder {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .default_headers(headers)
    }
}

/// Remote contact service, as used by the import runner.
#[async_trait::async_trait]
pub trait ContactApi: Send + Sync {
    async fn list_inboxes(&self, account_id: AccountId) -> Result<Vec<Inbox>, ApiError>;

    async fn create_inbox(&self, account_id: AccountId, name: &str) -> Result<Inbox, ApiError>;

    /// Never fails on duplicates or other 4xx rejections; those come back as
    /// [`CreateContactOutcome::Rejected`].
    async fn create_contact(
        &self,
        account_id: AccountId,
        inbox_id: InboxId,
        contact: &FormattedContact,
    ) -> Result<CreateContactOutcome, ApiError>;

    /// Idempotent: labels already on the contact are not attached again.
    async fn attach_labels(
        &self,
        account_id: AccountId,
        contact_id: ContactId,
        labels: &[String],
    ) -> Result<LabelAttachment, ApiError>;
}

/// Signs in and returns the issued tokens together with the user's accounts.
pub async fn login(
    settings: &ApiSettings,
    email: &str,
    password: &str,
) -> Result<LoginSession, ApiError> {
    let client = settings
        .client_builder()
        .build()
        .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;

    import_info!("Signing in as {}", email);
    let response = client
        .post(settings.endpoint("/auth/sign_in"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .map_err(map_reqwest_error)?;
    let response = ensure_success(response).await?;

    let tokens = tokens_from_headers(response.headers())?;
    let body: Value = response.json().await.map_err(map_reqwest_error)?;
    let data = body
        .get("data")
        .cloned()
        .ok_or_else(|| {
            ApiError::new(
                FailureKind::InvalidResponse,
                "missing `data` in sign-in response",
            )
        })?;

    let user: UserProfile = decode(data.clone())?;
    let accounts: Vec<Account> = match data.get("accounts") {
        Some(accounts) => decode(accounts.clone())?,
        None => Vec::new(),
    };

    Ok(LoginSession {
        tokens,
        user,
        accounts,
    })
}

fn tokens_from_headers(headers: &HeaderMap) -> Result<AuthTokens, ApiError> {
    let read = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
    };
    match (read(ACCESS_TOKEN_HEADER), read(CLIENT_HEADER), read(UID_HEADER)) {
        (Some(access_token), Some(client), Some(uid)) => Ok(AuthTokens {
            access_token,
            client,
            uid,
        }),
        _ => Err(ApiError::new(
            FailureKind::MissingAuthTokens,
            "Missing authentication headers in response",
        )),
    }
}

/// HTTP implementation of [`ContactApi`]. The auth tokens are attached to
/// every request as default headers.
#[derive(Debug, Clone)]
pub struct ReqwestContactApi {
    settings: ApiSettings,
    client: reqwest::Client,
}

impl ReqwestContactApi {
    pub fn new(settings: ApiSettings, tokens: &AuthTokens) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        for (name, value) in [
            (ACCESS_TOKEN_HEADER, &tokens.access_token),
            (CLIENT_HEADER, &tokens.client),
            (UID_HEADER, &tokens.uid),
        ] {
            let mut value = HeaderValue::from_str(value).map_err(|_| {
                ApiError::new(
                    FailureKind::InvalidToken,
                    format!("`{name}` is not a valid header value"),
                )
            })?;
            value.set_sensitive(true);
            headers.insert(HeaderName::from_static(name), value);
        }

        let client = settings
            .client_builder()
            .default_headers(headers)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    fn account_path(&self, account_id: AccountId, rest: &str) -> String {
        self.settings.endpoint(&format!("/api/v1/accounts/{account_id}{rest}"))
    }

    async fn get_json(&self, url: String) -> Result<Value, ApiError> {
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;
        let response = ensure_success(response).await?;
        response.json().await.map_err(map_reqwest_error)
    }

    async fn post_json<B: Serialize + ?Sized + Sync>(
        &self,
        url: String,
        body: &B,
    ) -> Result<Response, ApiError> {
        self.client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)
    }

    async fn contact_labels(
        &self,
        account_id: AccountId,
        contact_id: ContactId,
    ) -> Result<Vec<String>, ApiError> {
        let body = self
            .get_json(self.account_path(account_id, &format!("/contacts/{contact_id}/labels")))
            .await?;
        match body.get("payload") {
            Some(labels) => decode(labels.clone()),
            None => Ok(Vec::new()),
        }
    }

    /// Makes sure the account knows every label. Existing labels make the
    /// service answer 422, which is expected here.
    async fn ensure_account_labels(
        &self,
        account_id: AccountId,
        labels: &[String],
    ) -> Result<(), ApiError> {
        let titles: Vec<_> = labels.iter().map(|title| json!({ "title": title })).collect();
        let response = self
            .post_json(self.account_path(account_id, "/labels"), &json!({ "labels": titles }))
            .await?;
        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            import_debug!("Account {} already has some of the labels", account_id);
            return Ok(());
        }
        ensure_success(response).await.map(|_| ())
    }
}

#[async_trait::async_trait]
impl ContactApi for ReqwestContactApi {
    async fn list_inboxes(&self, account_id: AccountId) -> Result<Vec<Inbox>, ApiError> {
        let body = self.get_json(self.account_path(account_id, "/inboxes")).await?;
        match body.get("payload").or_else(|| body.get("inboxes")) {
            Some(inboxes) => decode(inboxes.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn create_inbox(&self, account_id: AccountId, name: &str) -> Result<Inbox, ApiError> {
        let body = json!({
            "name": name,
            "channel": {
                "type": "web_widget",
                "website_url": self.settings.base_url,
            },
        });
        let response = self
            .post_json(self.account_path(account_id, "/inboxes"), &body)
            .await?;
        let response = ensure_success(response).await?;
        let body: Value = response.json().await.map_err(map_reqwest_error)?;
        decode(body.get("payload").cloned().unwrap_or(body))
    }

    async fn create_contact(
        &self,
        account_id: AccountId,
        inbox_id: InboxId,
        contact: &FormattedContact,
    ) -> Result<CreateContactOutcome, ApiError> {
        #[derive(Serialize)]
        struct NewContact<'a> {
            inbox_id: InboxId,
            #[serde(flatten)]
            fields: &'a FormattedContact,
        }

        let payload = NewContact {
            inbox_id,
            fields: contact,
        };
        let response = self
            .post_json(
                self.account_path(account_id, "/contacts"),
                &json!({ "contact": payload }),
            )
            .await?;

        let status = response.status();
        if status.is_success() {
            let body: Value = response.json().await.map_err(map_reqwest_error)?;
            let created = body
                .pointer("/payload/contact")
                .or_else(|| body.get("contact"))
                .or_else(|| body.get("payload"))
                .cloned()
                .ok_or_else(|| {
                    ApiError::new(FailureKind::InvalidResponse, "missing contact in response")
                })?;
            let created: CreatedContact = decode(created)?;
            import_debug!("Created contact {} in account {}", created.id, account_id);
            return Ok(CreateContactOutcome::Created(created));
        }

        let message = response_message(response).await;
        if status.is_client_error() {
            let (kind, message) = classify_rejection(status.as_u16(), message.as_deref());
            import_warn!("Contact rejected with {}: {}", status, message);
            return Ok(CreateContactOutcome::Rejected { kind, message });
        }
        Err(ApiError::new(
            FailureKind::HttpStatus(status.as_u16()),
            message.unwrap_or_else(|| status.to_string()),
        ))
    }

    async fn attach_labels(
        &self,
        account_id: AccountId,
        contact_id: ContactId,
        labels: &[String],
    ) -> Result<LabelAttachment, ApiError> {
        let existing = self.contact_labels(account_id, contact_id).await?;
        let mut seen: BTreeSet<&str> = existing.iter().map(String::as_str).collect();
        let added: Vec<String> = labels
            .iter()
            .filter(|label| seen.insert(label.as_str()))
            .cloned()
            .collect();
        if added.is_empty() {
            import_debug!("Contact {} already has all labels", contact_id);
            return Ok(LabelAttachment::default());
        }

        self.ensure_account_labels(account_id, &added).await?;

        let mut all = existing;
        all.extend(added.iter().cloned());
        let response = self
            .post_json(
                self.account_path(account_id, &format!("/contacts/{contact_id}/labels")),
                &json!({ "labels": all }),
            )
            .await?;
        ensure_success(response).await?;
        Ok(LabelAttachment { added })
    }
}

/// Maps a 4xx create-contact response to an import error kind and the
/// message shown to the user.
pub fn classify_rejection(status: u16, message: Option<&str>) -> (ImportErrorKind, String) {
    if status == StatusCode::UNPROCESSABLE_ENTITY.as_u16() {
        let lower = message.unwrap_or_default().to_lowercase();
        if lower.contains("phone number") && lower.contains("taken") {
            return (
                ImportErrorKind::DuplicatePhone,
                "Phone number already exists".to_string(),
            );
        }
        if lower.contains("email") && lower.contains("taken") {
            return (
                ImportErrorKind::DuplicateEmail,
                "Email already exists".to_string(),
            );
        }
    }
    let message = match message {
        Some(message) if !message.is_empty() => message.to_string(),
        _ => format!("Request failed with status {status}"),
    };
    (ImportErrorKind::Other, message)
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response_message(response).await;
    Err(ApiError::new(
        FailureKind::HttpStatus(status.as_u16()),
        message.unwrap_or_else(|| status.to_string()),
    ))
}

/// Best-effort extraction of the service's error text.
async fn response_message(response: Response) -> Option<String> {
    let text = response.text().await.ok()?;
    let body: Value = serde_json::from_str(&text).ok()?;
    let message = body
        .get("message")
        .or_else(|| body.get("error"))
        .or_else(|| body.get("errors"))?;
    match message {
        Value::String(text) => Some(text.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .map(importer_core::scalar_text)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(other.to_string()),
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value)
        .map_err(|err| ApiError::new(FailureKind::InvalidResponse, err.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ApiError::new(FailureKind::InvalidResponse, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
