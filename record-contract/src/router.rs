//! Maps decoded commands onto record operations.
//!
//! Policy, in precedence order:
//!
//! 1. In read-only mode anything but `READ_RECORD` is refused. Known commands
//!    get [`READ_ONLY_UNSUPPORTED`], unknown ones [`INVALID_INPUT`].
//! 2. `CREATE_RECORD` and `UPDATE_RECORD` overwrite the record.
//! 3. `READ_RECORD` reads it.
//! 4. `DELETE_RECORD` removes it.
//! 5. Anything else is [`INVALID_INPUT`].

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    channel::{Output, UserId},
    message::{Command, CommandKind, INVALID_INPUT, READ_ONLY_UNSUPPORTED, Response},
    records::{RecordKey, Records},
    store::RecordStore,
};

pub struct Router<S> {
    records: Records<S>,
    output: Arc<dyn Output>,
}

impl<S: RecordStore> Router<S> {
    pub fn new(store: S, output: Arc<dyn Output>) -> Self {
        Self {
            records: Records::new(store),
            output,
        }
    }

    /// Routes `command` and sends exactly one response to `user`.
    ///
    /// A failed delivery is logged and swallowed; the caller moves on to the
    /// next input either way.
    pub async fn handle(&self, user: &UserId, command: &Command, read_only: bool) {
        let response = self.route(command, read_only).await;
        self.emit(user, &response).await;
    }

    /// Sends `response` to `user` without routing anything.
    pub async fn emit(&self, user: &UserId, response: &Response) {
        if let Err(err) = self.output.send(user, response).await {
            warn!(%user, error = ?err, "failed to deliver response");
        }
    }

    pub async fn route(&self, command: &Command, read_only: bool) -> Response {
        let kind = command.known_kind();
        debug!(command = %command.kind, uri = ?command.uri, read_only, "routing command");

        if read_only && kind != Some(CommandKind::ReadRecord) {
            return match kind {
                Some(_) => Response::error(READ_ONLY_UNSUPPORTED),
                None => Response::error(INVALID_INPUT),
            };
        }

        let Some(kind) = kind else {
            return Response::error(INVALID_INPUT);
        };
        let key = match resolve_key(command) {
            Some(key) => key,
            None => return Response::error(INVALID_INPUT),
        };

        match kind {
            CommandKind::CreateRecord | CommandKind::UpdateRecord => {
                let record = command.record.as_ref().unwrap_or(&Value::Null);
                self.records.put(&key, record).await
            }
            CommandKind::ReadRecord => self.records.get(&key).await,
            CommandKind::DeleteRecord => self.records.remove(&key).await,
        }
    }
}

fn resolve_key(command: &Command) -> Option<RecordKey> {
    let Some(uri) = command.uri.as_deref() else {
        debug!(command = %command.kind, "command has no uri");
        return None;
    };
    match RecordKey::from_uri(uri) {
        Ok(key) => Some(key),
        Err(err) => {
            warn!(uri, error = %err, "rejected record uri");
            None
        }
    }
}
