use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::PrefsStoreError;
use crate::schema::{ApiKeys, ModePreference, PrefsDocument};
use crate::schema::{API_KEYS_NAMESPACE, CHAT_MODE_NAMESPACE};

/// Namespaced key-value preference storage backed by one JSON document.
///
/// The chat core treats this purely as a read/write source for the mode
/// value and the credential string; it never owns conversation state.
pub struct PrefsStore {
    path: PathBuf,
    document: PrefsDocument,
}

impl PrefsStore {
    /// Opens an existing preference file, validating version and timestamp.
    pub fn open(path: &Path) -> Result<Self, PrefsStoreError> {
        let path = path.to_path_buf();
        let raw = fs::read_to_string(&path)
            .map_err(|source| PrefsStoreError::io("reading preferences file", &path, source))?;
        let document: PrefsDocument = serde_json::from_str(&raw)
            .map_err(|source| PrefsStoreError::json_parse(&path, source))?;

        validate_document(&path, &document)?;

        Ok(Self { path, document })
    }

    /// Opens the file at `path`, or starts a fresh document when it does not
    /// exist yet. A present-but-corrupt file is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self, PrefsStoreError> {
        if path.exists() {
            return Self::open(path);
        }

        Ok(Self {
            path: path.to_path_buf(),
            document: PrefsDocument::v1(now_rfc3339()?),
        })
    }

    /// Persists the document atomically (temp file + rename).
    pub fn save(&mut self) -> Result<(), PrefsStoreError> {
        self.document.updated_at = now_rfc3339()?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| {
                PrefsStoreError::io("creating preferences directory", parent, source)
            })?;
        }

        let encoded = serde_json::to_string_pretty(&self.document)
            .map_err(|source| PrefsStoreError::json_serialize(&self.path, source))?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, encoded).map_err(|source| {
            PrefsStoreError::io("writing preferences temp file", &tmp_path, source)
        })?;
        fs::rename(&tmp_path, &self.path)
            .map_err(|source| PrefsStoreError::io("replacing preferences file", &self.path, source))?;

        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn updated_at(&self) -> &str {
        &self.document.updated_at
    }

    /// Reads one namespace as a typed value; `None` when absent.
    pub fn namespace<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, PrefsStoreError> {
        let Some(value) = self.document.namespaces.get(name) else {
            return Ok(None);
        };

        serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|source| PrefsStoreError::json_parse(&self.path, source))
    }

    /// Replaces one namespace with a typed value. Callers still need
    /// [`PrefsStore::save`] to persist.
    pub fn set_namespace<T: Serialize>(
        &mut self,
        name: &str,
        value: &T,
    ) -> Result<(), PrefsStoreError> {
        let encoded = serde_json::to_value(value)
            .map_err(|source| PrefsStoreError::json_serialize(&self.path, source))?;
        self.document.namespaces.insert(name.to_owned(), encoded);
        Ok(())
    }

    /// Typed accessor for the credentials namespace.
    pub fn api_keys(&self) -> Result<ApiKeys, PrefsStoreError> {
        Ok(self.namespace(API_KEYS_NAMESPACE)?.unwrap_or_default())
    }

    pub fn set_api_keys(&mut self, keys: &ApiKeys) -> Result<(), PrefsStoreError> {
        self.set_namespace(API_KEYS_NAMESPACE, keys)
    }

    /// Typed accessor for the persisted render-mode name.
    pub fn chat_mode(&self) -> Result<Option<String>, PrefsStoreError> {
        Ok(self
            .namespace::<ModePreference>(CHAT_MODE_NAMESPACE)?
            .map(|preference| preference.mode)
            .filter(|mode| !mode.is_empty()))
    }

    pub fn set_chat_mode(&mut self, mode: &str) -> Result<(), PrefsStoreError> {
        self.set_namespace(
            CHAT_MODE_NAMESPACE,
            &ModePreference {
                mode: mode.to_owned(),
            },
        )
    }
}

fn validate_document(path: &Path, document: &PrefsDocument) -> Result<(), PrefsStoreError> {
    if document.version != 1 {
        return Err(PrefsStoreError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: document.version,
        });
    }

    if OffsetDateTime::parse(&document.updated_at, &Rfc3339).is_err() {
        return Err(PrefsStoreError::InvalidTimestamp {
            path: path.to_path_buf(),
            value: document.updated_at.clone(),
        });
    }

    Ok(())
}

fn now_rfc3339() -> Result<String, PrefsStoreError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(PrefsStoreError::ClockFormat)
}
