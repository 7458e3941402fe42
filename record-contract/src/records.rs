//! Record operations on top of a [`RecordStore`].
//!
//! Every operation is total: storage and encoding failures are logged and
//! folded into a fixed client-facing [`Response::Error`] message.

use std::fmt;

use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    message::Response,
    store::{RecordStore, StoreError},
};

pub const RECORD_EXTENSION: &str = "log";

pub const RECORDED: &str = "success";
pub const CLEARED: &str = "Cleared record.";
pub const RECORD_FAILED: &str = "Error occurred while recording.";
pub const NO_RECORDS: &str = "No records found.";
pub const CLEAR_FAILED: &str = "Error occurred clearing record.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("uri is empty")]
    Empty,

    #[error("uri {0:?} contains a path separator or NUL byte")]
    ForbiddenCharacter(String),

    #[error("uri {0:?} is a relative path component")]
    RelativeComponent(String),
}

/// Storage key for a resource: `<uri>.log`.
///
/// The uri becomes a file name, so anything that could step outside the
/// data directory is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordKey(String);

impl RecordKey {
    pub fn from_uri(uri: &str) -> Result<Self, KeyError> {
        if uri.is_empty() {
            return Err(KeyError::Empty);
        }
        if uri.contains(['/', '\\', '\0']) {
            return Err(KeyError::ForbiddenCharacter(uri.to_string()));
        }
        if uri == "." || uri == ".." {
            return Err(KeyError::RelativeComponent(uri.to_string()));
        }
        Ok(Self(format!("{uri}.{RECORD_EXTENSION}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct Records<S> {
    store: S,
}

impl<S: RecordStore> Records<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Serializes `value` and overwrites whatever is stored under `key`.
    pub async fn put(&self, key: &RecordKey, value: &Value) -> Response {
        let encoded = match serde_json::to_vec(value) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(%key, error = %err, "failed to serialize record");
                return Response::error(RECORD_FAILED);
            }
        };

        match self.store.put(key.as_str(), encoded).await {
            Ok(()) => Response::data(RECORDED),
            Err(err) => {
                warn!(%key, error = %err, "failed to write record");
                Response::error(RECORD_FAILED)
            }
        }
    }

    /// Absent and corrupt records look the same to the client.
    pub async fn get(&self, key: &RecordKey) -> Response {
        let bytes = match self.store.get(key.as_str()).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(%key, "record not found");
                return Response::error(NO_RECORDS);
            }
            Err(err) => {
                warn!(%key, error = %err, "failed to read record");
                return Response::error(NO_RECORDS);
            }
        };

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(data) => Response::data(data),
            Err(err) => {
                warn!(%key, error = %err, "stored record is not valid json");
                Response::error(NO_RECORDS)
            }
        }
    }

    pub async fn remove(&self, key: &RecordKey) -> Response {
        match self.store.delete(key.as_str()).await {
            Ok(()) => Response::data(CLEARED),
            Err(StoreError::NotFound(_)) => {
                debug!(%key, "delete of absent record");
                Response::error(CLEAR_FAILED)
            }
            Err(err) => {
                warn!(%key, error = %err, "failed to delete record");
                Response::error(CLEAR_FAILED)
            }
        }
    }
}
