//! Gemini API credential holder.
//!
//! The key is kept in the record store under [`CREDENTIAL_KEY`] as a JSON
//! string. An absent value, a blank value, or the placeholder sentinel all mean
//! "not configured", which selects simulated analysis instead of a network call.

use std::fmt;
use tracing::info;

use crate::store::{RecordStore, StoreError};

/// Storage key for the credential
pub const CREDENTIAL_KEY: &str = "GEMINI_API_KEY";

/// Placeholder value meaning no real key has been entered
pub const CREDENTIAL_SENTINEL: &str = "GEMINI_API_KEY";

const MASK: &str = "••••••••••••••••••••••••••";

/// Resolved credential state. Selected once at startup.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Configured(String),
    Unconfigured,
}

// Never print the key itself
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Configured(_) => f.write_str("Configured(***)"),
            Credential::Unconfigured => f.write_str("Unconfigured"),
        }
    }
}

impl Credential {
    /// Interpret a raw stored value
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(value) if !value.is_empty() && value != CREDENTIAL_SENTINEL => {
                Credential::Configured(value.to_string())
            }
            _ => Credential::Unconfigured,
        }
    }

    /// Load from the record store. Read failures count as unconfigured.
    ///
    /// Values written before the key was JSON-quoted are read as-is.
    pub fn load(store: &RecordStore) -> Self {
        let raw = store
            .backend()
            .get_item(CREDENTIAL_KEY)
            .ok()
            .flatten()
            .map(|raw| serde_json::from_str::<String>(&raw).unwrap_or(raw));
        Self::from_raw(raw.as_deref())
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Credential::Configured(_))
    }

    /// Display form for settings screens
    pub fn masked(&self) -> &'static str {
        match self {
            Credential::Configured(_) => MASK,
            Credential::Unconfigured => "",
        }
    }
}

/// Credential errors
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Please enter an API key")]
    Empty,
    #[error("'{}' is a placeholder, please enter a real API key", CREDENTIAL_SENTINEL)]
    Placeholder,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Store a new key. Blank keys and the placeholder are rejected rather than
/// silently meaning "unconfigured".
pub fn set_api_key(store: &RecordStore, api_key: &str) -> Result<Credential, CredentialError> {
    let trimmed = api_key.trim();
    if trimmed.is_empty() {
        return Err(CredentialError::Empty);
    }
    if trimmed == CREDENTIAL_SENTINEL {
        return Err(CredentialError::Placeholder);
    }
    store.write_value(CREDENTIAL_KEY, &trimmed)?;
    info!("API key saved");
    Ok(Credential::from_raw(Some(trimmed)))
}

/// Remove the stored key, returning to simulated mode
pub fn clear_api_key(store: &RecordStore) -> Result<(), CredentialError> {
    store.backend().remove_item(CREDENTIAL_KEY)?;
    info!("API key cleared");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw() {
        assert_eq!(Credential::from_raw(None), Credential::Unconfigured);
        assert_eq!(Credential::from_raw(Some("")), Credential::Unconfigured);
        assert_eq!(Credential::from_raw(Some("   ")), Credential::Unconfigured);
        assert_eq!(
            Credential::from_raw(Some(CREDENTIAL_SENTINEL)),
            Credential::Unconfigured
        );
        assert_eq!(
            Credential::from_raw(Some(" real-key ")),
            Credential::Configured("real-key".to_string())
        );
    }

    #[test]
    fn test_load_defaults_to_unconfigured() {
        let store = RecordStore::in_memory();
        assert_eq!(Credential::load(&store), Credential::Unconfigured);
    }

    #[test]
    fn test_set_and_clear() {
        let store = RecordStore::in_memory();

        let credential = set_api_key(&store, "abc123").unwrap();
        assert!(credential.is_configured());
        assert_eq!(Credential::load(&store), credential);

        clear_api_key(&store).unwrap();
        assert_eq!(Credential::load(&store), Credential::Unconfigured);
    }

    #[test]
    fn test_set_empty_rejected() {
        let store = RecordStore::in_memory();
        assert!(matches!(set_api_key(&store, "  "), Err(CredentialError::Empty)));
        assert_eq!(Credential::load(&store), Credential::Unconfigured);
    }

    #[test]
    fn test_set_placeholder_rejected() {
        let store = RecordStore::in_memory();
        assert!(matches!(
            set_api_key(&store, CREDENTIAL_SENTINEL),
            Err(CredentialError::Placeholder)
        ));
        assert_eq!(store.backend().get_item(CREDENTIAL_KEY).unwrap(), None);
    }

    #[test]
    fn test_key_stored_as_json_string() {
        let store = RecordStore::in_memory();
        set_api_key(&store, "abc\"123").unwrap();

        let raw = store.backend().get_item(CREDENTIAL_KEY).unwrap().unwrap();
        assert_eq!(raw, r#""abc\"123""#);
        assert_eq!(
            Credential::load(&store),
            Credential::Configured("abc\"123".to_string())
        );
    }

    #[test]
    fn test_unquoted_key_still_loads() {
        let store = RecordStore::in_memory();
        store.backend().set_item(CREDENTIAL_KEY, "legacy-key").unwrap();
        assert_eq!(
            Credential::load(&store),
            Credential::Configured("legacy-key".to_string())
        );
    }

    #[test]
    fn test_sentinel_stored_reads_unconfigured() {
        let store = RecordStore::in_memory();
        store
            .backend()
            .set_item(CREDENTIAL_KEY, CREDENTIAL_SENTINEL)
            .unwrap();
        assert_eq!(Credential::load(&store), Credential::Unconfigured);
    }

    #[test]
    fn test_masked_and_debug_hide_key() {
        let credential = Credential::Configured("super-secret".to_string());
        assert!(!credential.masked().is_empty());
        assert!(!credential.masked().contains("super-secret"));
        assert!(!format!("{:?}", credential).contains("super-secret"));
        assert_eq!(Credential::Unconfigured.masked(), "");
    }
}
