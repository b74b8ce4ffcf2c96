use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use importer_engine::{write_atomic, Account, AccountId, AuthTokens, LoginSession, UserProfile};
use importer_logging::{import_info, import_warn};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SESSION_FILE: &str = ".contact_import_session.ron";

const NOT_AUTHENTICATED: &str = "Not authenticated. Please login first.";

/// Login state kept between invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub tokens: AuthTokens,
    pub user: UserProfile,
    pub accounts: Vec<Account>,
    pub logged_in_at: DateTime<Utc>,
}

impl StoredSession {
    pub fn new(login: LoginSession, logged_in_at: DateTime<Utc>) -> Self {
        Self {
            tokens: login.tokens,
            user: login.user,
            accounts: login.accounts,
            logged_in_at,
        }
    }

    /// Picks the requested account, or the only one when none is requested.
    pub fn account(&self, requested: Option<AccountId>) -> Result<&Account> {
        match requested {
            Some(id) => self
                .accounts
                .iter()
                .find(|account| account.id == id)
                .with_context(|| format!("account {id} is not available to this login")),
            None => match self.accounts.as_slice() {
                [only] => Ok(only),
                [] => bail!(
                    "Your login must be associated with at least one account to use the import service."
                ),
                _ => bail!("Several accounts are available; choose one with --account"),
            },
        }
    }
}

pub fn load(path: &Path) -> Result<StoredSession> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => bail!(NOT_AUTHENTICATED),
        Err(err) => {
            return Err(err).with_context(|| format!("reading session {}", path.display()))
        }
    };
    match ron::from_str(&text) {
        Ok(session) => Ok(session),
        Err(err) => {
            import_warn!("Ignoring unreadable session {}: {}", path.display(), err);
            bail!(NOT_AUTHENTICATED)
        }
    }
}

pub fn save(path: &Path, session: &StoredSession) -> Result<()> {
    let pretty = ron::ser::PrettyConfig::new();
    let content = ron::ser::to_string_pretty(session, pretty).context("serializing session")?;
    write_atomic(path, content.as_bytes())
        .with_context(|| format!("writing session {}", path.display()))?;
    import_info!("Saved session for {}", session.user.email);
    Ok(())
}

/// Removes the stored session. Returns whether one existed.
pub fn clear(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("removing session {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn account(id: AccountId) -> Account {
        Account {
            id,
            name: format!("Account {id}"),
            role: None,
        }
    }

    fn session(accounts: Vec<Account>) -> StoredSession {
        StoredSession {
            tokens: AuthTokens {
                access_token: "tok".to_string(),
                client: "cli".to_string(),
                uid: "ada@example.com".to_string(),
            },
            user: UserProfile {
                id: 7,
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
            },
            accounts,
            logged_in_at: Utc.with_ymd_and_hms(2026, 10, 1, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn saved_session_loads_back() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(DEFAULT_SESSION_FILE);
        let stored = session(vec![account(1)]);

        save(&path, &stored).unwrap();
        assert_eq!(load(&path).unwrap(), stored);

        assert!(clear(&path).unwrap());
        assert!(!clear(&path).unwrap());
    }

    #[test]
    fn missing_session_means_not_authenticated() {
        let temp = TempDir::new().unwrap();
        let err = load(&temp.path().join("none.ron")).unwrap_err();
        assert_eq!(err.to_string(), NOT_AUTHENTICATED);
    }

    #[test]
    fn account_selection() {
        let single = session(vec![account(1)]);
        assert_eq!(single.account(None).unwrap().id, 1);
        assert!(single.account(Some(2)).is_err());

        let several = session(vec![account(1), account(2)]);
        assert!(several.account(None).is_err());
        assert_eq!(several.account(Some(2)).unwrap().id, 2);

        let none = session(Vec::new());
        assert_eq!(
            none.account(None).unwrap_err().to_string(),
            "Your login must be associated with at least one account to use the import service."
        );
    }
}
